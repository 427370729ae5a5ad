use crate::algebra::{BinaryOperation, Expression, Parameter, Rational};
use num_bigint::BigInt;
use std::{iter::Peekable, ops::Range, str::FromStr};

/// Parse an [`Expression`] tree from some text.
pub fn parse(s: &str) -> Result<Expression, ParseError> {
    Parser::new(s).parse()
}

impl FromStr for Expression {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parse(s) }
}

/// A simple recursive descent parser (`LL(1)`) for converting a string into an
/// expression tree.
///
/// The grammar:
///
/// ```text
/// expression     := term (("+" | "-") term)*
///
/// term           := factor (("*" | "/") factor)*
///
/// factor         := "-" factor
///                 | power
///
/// power          := primary ("^" factor)?
///
/// primary        := variable_or_function_call
///                 | "(" expression ")"
///                 | NUMBER
///
/// variable_or_function_call = IDENTIFIER "(" expression ")"
///                           | IDENTIFIER
/// ```
#[derive(Debug, Clone)]
pub(crate) struct Parser<'a> {
    tokens: Peekable<Tokens<'a>>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Parser {
            tokens: Tokens::new(src).peekable(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expression, ParseError> {
        let expr = self.expression()?;

        match self.tokens.next() {
            None => Ok(expr),
            Some(Ok(token)) => Err(ParseError::UnexpectedToken {
                found: token.kind,
                span: token.span,
                expected: &[
                    TokenKind::Plus,
                    TokenKind::Minus,
                    TokenKind::Times,
                    TokenKind::Divide,
                    TokenKind::Caret,
                ],
            }),
            Some(Err(e)) => Err(e),
        }
    }

    fn peek(&mut self) -> Option<TokenKind> {
        self.tokens
            .peek()
            .and_then(|result| result.as_ref().ok())
            .map(|tok| tok.kind)
    }

    fn advance(&mut self) -> Result<Token<'a>, ParseError> {
        match self.tokens.next() {
            Some(result) => result,
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    fn expression(&mut self) -> Result<Expression, ParseError> {
        let left = self.term()?;

        self.then_binary_ops(left, &[TokenKind::Plus, TokenKind::Minus], |p| {
            p.term()
        })
    }

    fn term(&mut self) -> Result<Expression, ParseError> {
        let left = self.factor()?;

        self.then_binary_ops(
            left,
            &[TokenKind::Times, TokenKind::Divide],
            |p| p.factor(),
        )
    }

    /// Keep folding `left op operand` while the next token is one of the
    /// `expected` operators, so chains associate to the left.
    fn then_binary_ops<F>(
        &mut self,
        mut left: Expression,
        expected: &[TokenKind],
        mut operand: F,
    ) -> Result<Expression, ParseError>
    where
        F: FnMut(&mut Parser<'a>) -> Result<Expression, ParseError>,
    {
        while let Some(kind) = self.peek() {
            if !expected.contains(&kind) {
                break;
            }

            // skip past the operator
            let _ = self.advance()?;
            // and parse the second bit
            let right = operand(self)?;

            left = Expression::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op: kind.as_binary_op(),
            };
        }

        Ok(left)
    }

    fn factor(&mut self) -> Result<Expression, ParseError> {
        if self.peek() == Some(TokenKind::Minus) {
            let _ = self.advance()?;

            return match self.factor()? {
                Expression::Constant(value) => Ok(Expression::Constant(-value)),
                operand => Ok(Expression::Negate(Box::new(operand))),
            };
        }

        self.power()
    }

    fn power(&mut self) -> Result<Expression, ParseError> {
        let base = self.primary()?;

        if self.peek() == Some(TokenKind::Caret) {
            let _ = self.advance()?;
            let exponent = self.factor()?;
            return Ok(base.pow(exponent));
        }

        Ok(base)
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        let expected = &[
            TokenKind::Number,
            TokenKind::Identifier,
            TokenKind::Minus,
            TokenKind::OpenParen,
        ];

        match self.peek() {
            Some(TokenKind::Number) => {
                return self.number();
            },
            Some(TokenKind::Identifier) => {
                return self.variable_or_function_call()
            },
            Some(TokenKind::OpenParen) => {
                let _ = self.advance()?;
                let expr = self.expression()?;
                self.close_paren()?;
                return Ok(expr);
            },
            _ => {},
        }

        // we couldn't parse the factor, return a nice error
        match self.tokens.next() {
            Some(Ok(Token { span, kind, .. })) => {
                Err(ParseError::UnexpectedToken {
                    found: kind,
                    expected,
                    span,
                })
            },
            Some(Err(e)) => Err(e),
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    fn close_paren(&mut self) -> Result<(), ParseError> {
        let Token { kind, span, .. } = self.advance()?;

        if kind == TokenKind::CloseParen {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: kind,
                span,
                expected: &[TokenKind::CloseParen],
            })
        }
    }

    fn variable_or_function_call(&mut self) -> Result<Expression, ParseError> {
        let ident = self.advance()?;
        debug_assert_eq!(ident.kind, TokenKind::Identifier);

        if self.peek() == Some(TokenKind::OpenParen) {
            self.function_call(ident)
        } else {
            Ok(Expression::Parameter(Parameter::named(ident.text)))
        }
    }

    fn function_call(
        &mut self,
        identifier: Token<'a>,
    ) -> Result<Expression, ParseError> {
        let open_paren = self.advance()?;
        debug_assert_eq!(open_paren.kind, TokenKind::OpenParen);

        let argument = self.expression()?;
        self.close_paren()?;

        Ok(Expression::FunctionCall {
            function: identifier.text.into(),
            argument: Box::new(argument),
        })
    }

    fn number(&mut self) -> Result<Expression, ParseError> {
        let token = self.advance()?;
        debug_assert_eq!(token.kind, TokenKind::Number);

        Ok(Expression::Constant(exact_decimal(token.text)))
    }
}

/// Read a decimal literal like `3.14` as the exact fraction `314/100`.
fn exact_decimal(text: &str) -> Rational {
    let (whole, fraction) = match text.find('.') {
        Some(index) => (&text[..index], &text[index + 1..]),
        None => (text, ""),
    };

    let digits: BigInt = format!("{}{}", whole, fraction)
        .parse()
        .expect("Guaranteed correct by the lexer");
    let scale = num_traits::pow(BigInt::from(10), fraction.len());

    Rational::new(digits, scale)
}

/// Possible errors that may occur while parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("found {found:?} at {span:?} but expected one of {expected:?}")]
    UnexpectedToken {
        found: TokenKind,
        span: Range<usize>,
        expected: &'static [TokenKind],
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Tokens<'a> {
    src: &'a str,
    cursor: usize,
}

impl<'a> Tokens<'a> {
    fn new(src: &'a str) -> Self { Tokens { src, cursor: 0 } }

    fn rest(&self) -> &'a str { &self.src[self.cursor..] }

    fn peek(&self) -> Option<char> { self.rest().chars().next() }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    fn chomp(
        &mut self,
        kind: TokenKind,
    ) -> Option<Result<Token<'a>, ParseError>> {
        let start = self.cursor;
        self.advance()?;
        let end = self.cursor;

        Some(Ok(Token::from_text(self.src, start..end, kind)))
    }

    fn take_while<P>(&mut self, mut predicate: P) -> Range<usize>
    where
        P: FnMut(char) -> bool,
    {
        let start = self.cursor;

        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }

            self.advance();
        }

        start..self.cursor
    }

    fn chomp_number(&mut self) -> Token<'a> {
        let start = self.cursor;
        self.take_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') {
            // skip past the decimal
            self.advance();
            self.take_while(|c| c.is_ascii_digit());
        }

        Token::from_text(self.src, start..self.cursor, TokenKind::Number)
    }

    fn chomp_identifier(&mut self) -> Token<'a> {
        let span = self.take_while(|c| c.is_alphanumeric() || c == '_');

        Token::from_text(self.src, span, TokenKind::Identifier)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            return match self.peek()? {
                space if space.is_whitespace() => {
                    self.advance();
                    continue;
                },
                '(' => self.chomp(TokenKind::OpenParen),
                ')' => self.chomp(TokenKind::CloseParen),
                '+' => self.chomp(TokenKind::Plus),
                '-' => self.chomp(TokenKind::Minus),
                '*' => self.chomp(TokenKind::Times),
                '/' => self.chomp(TokenKind::Divide),
                '^' => self.chomp(TokenKind::Caret),
                '_' | 'a'..='z' | 'A'..='Z' => {
                    Some(Ok(self.chomp_identifier()))
                },
                '0'..='9' => Some(Ok(self.chomp_number())),
                other => Some(Err(ParseError::InvalidCharacter {
                    character: other,
                    index: self.cursor,
                })),
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token<'a> {
    text: &'a str,
    span: Range<usize>,
    kind: TokenKind,
}

impl<'a> Token<'a> {
    fn from_text(
        input: &'a str,
        span: Range<usize>,
        kind: TokenKind,
    ) -> Self {
        Token {
            text: &input[span.clone()],
            span,
            kind,
        }
    }
}

/// The kinds of token that can appear in an [`Expression`]'s text form.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    Number,
    OpenParen,
    CloseParen,
    Plus,
    Minus,
    Times,
    Divide,
    Caret,
}

impl TokenKind {
    fn as_binary_op(self) -> BinaryOperation {
        match self {
            TokenKind::Plus => BinaryOperation::Plus,
            TokenKind::Minus => BinaryOperation::Minus,
            TokenKind::Times => BinaryOperation::Times,
            TokenKind::Divide => BinaryOperation::Divide,
            TokenKind::Caret => BinaryOperation::Power,
            other => unreachable!("{:?} is not a binary op", other),
        }
    }
}

#[cfg(test)]
mod tokenizer_tests {
    use super::*;

    macro_rules! tokenize_test {
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let mut tokens = Tokens::new($src);

                let got = tokens.next().unwrap().unwrap();

                let Range { start, end } = got.span;
                assert_eq!(start, 0);
                assert_eq!(end, $src.len());
                assert_eq!(got.kind, $should_be);

                assert!(
                    tokens.next().is_none(),
                    "{:?} should be empty",
                    tokens
                );
            }
        };
    }

    tokenize_test!(open_paren, "(", TokenKind::OpenParen);
    tokenize_test!(close_paren, ")", TokenKind::CloseParen);
    tokenize_test!(plus, "+", TokenKind::Plus);
    tokenize_test!(minus, "-", TokenKind::Minus);
    tokenize_test!(times, "*", TokenKind::Times);
    tokenize_test!(divide, "/", TokenKind::Divide);
    tokenize_test!(caret, "^", TokenKind::Caret);
    tokenize_test!(single_digit_integer, "3", TokenKind::Number);
    tokenize_test!(multi_digit_integer, "31", TokenKind::Number);
    tokenize_test!(number_with_trailing_dot, "31.", TokenKind::Number);
    tokenize_test!(simple_decimal, "3.14", TokenKind::Number);
    tokenize_test!(simple_identifier, "x", TokenKind::Identifier);
    tokenize_test!(root_identifier, "x1", TokenKind::Identifier);
    tokenize_test!(
        identifiers_can_start_with_underscores,
        "_hello_world",
        TokenKind::Identifier
    );

    #[test]
    fn reject_unknown_characters() {
        let mut tokens = Tokens::new("x $ y");

        assert_eq!(tokens.next().unwrap().unwrap().kind, TokenKind::Identifier);
        assert_eq!(
            tokens.next().unwrap(),
            Err(ParseError::InvalidCharacter {
                character: '$',
                index: 2
            })
        );
    }
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    macro_rules! parser_test {
        ($name:ident, $src:expr) => {
            parser_test!($name, $src, $src);
        };
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let got = Parser::new($src).parse().unwrap();

                let round_tripped = got.to_string();
                assert_eq!(round_tripped, $should_be);
            }
        };
    }

    parser_test!(simple_integer, "1");
    parser_test!(one_plus_one, "1 + 1");
    parser_test!(one_plus_one_plus_negative_one, "1 + -1");
    parser_test!(one_plus_one_times_three, "1 + 1*3");
    parser_test!(one_plus_one_all_times_three, "(1 + 1)*3");
    parser_test!(negative_one, "-1");
    parser_test!(negative_one_plus_x, "-1 + x");
    parser_test!(number_in_parens, "(1)", "1");
    parser_test!(bimdas, "1*2 + 3*4/(5 - 2)*1 - 3");
    parser_test!(subtraction_is_left_associative, "1 - 2 - 3");
    parser_test!(division_is_left_associative, "x/y/z");
    parser_test!(grouped_subtraction, "1 - (2 - 3)");
    parser_test!(power, "x^2");
    parser_test!(power_is_right_associative, "x^y^2");
    parser_test!(power_binds_tighter_than_negation, "-x^2");
    parser_test!(negative_exponent, "x^-1");
    parser_test!(quadratic, "k*x1^2 - 2*k*x1 + l");
    parser_test!(exact_decimal, "0.25", "1/4");
    parser_test!(trailing_dot, "31.", "31");
    parser_test!(function_call, "sqrt(1)");
    parser_test!(function_call_with_expression, "sqrt(1/0)");
    parser_test!(
        function_calls_function_calls_function_with_variable,
        "foo(bar(baz(pi)))"
    );

    #[test]
    fn subtraction_chains_fold_to_the_left() {
        let got = parse("1 - 2 - 3").unwrap();

        let should_be = (Expression::integer(1) - Expression::integer(2))
            - Expression::integer(3);
        assert_eq!(got, should_be);
    }

    #[test]
    fn unary_minus_on_a_literal_is_a_negative_constant() {
        assert_eq!(parse("-4").unwrap(), Expression::integer(-4));
        assert_eq!(
            parse("-x").unwrap(),
            Expression::Negate(Box::new(Expression::named("x")))
        );
    }

    #[test]
    fn report_bad_input() {
        let inputs = vec![
            ("", ParseError::UnexpectedEndOfInput),
            ("1 +", ParseError::UnexpectedEndOfInput),
            (
                "(1",
                ParseError::UnexpectedEndOfInput,
            ),
            (
                "1)",
                ParseError::UnexpectedToken {
                    found: TokenKind::CloseParen,
                    span: 1..2,
                    expected: &[
                        TokenKind::Plus,
                        TokenKind::Minus,
                        TokenKind::Times,
                        TokenKind::Divide,
                        TokenKind::Caret,
                    ],
                },
            ),
            (
                "* 2",
                ParseError::UnexpectedToken {
                    found: TokenKind::Times,
                    span: 0..1,
                    expected: &[
                        TokenKind::Number,
                        TokenKind::Identifier,
                        TokenKind::Minus,
                        TokenKind::OpenParen,
                    ],
                },
            ),
        ];

        for (src, should_be) in inputs {
            let got = parse(src).unwrap_err();
            assert_eq!(got, should_be, "{:?}", src);
        }
    }
}
