//! Read a session script from stdin.
//!
//! ```text
//! declare x1 x2 y k l
//! link x: x1 x2
//! answer answer
//! y = k*x1^2 - 2*k*x1 + l
//! ...
//! ```
//!
//! Try `RUST_LOG=reactive_constraints=debug` to see what the engine is doing.

use reactive_constraints::{Answer, Session};
use std::io::{BufRead, BufReader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env().init();

    let mut session = Session::new();
    let stdin = std::io::stdin();

    for line in BufReader::new(stdin.lock()).lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = execute(&mut session, line) {
            eprintln!("Unable to handle \"{}\": {}", line, e);
        }
    }

    for variable in session.variables() {
        let candidates: Vec<_> =
            variable.candidates().iter().map(ToString::to_string).collect();
        println!("  {} = {}", variable.name(), candidates.join(" | "));
    }

    match session.finalize_answer()? {
        Answer::Resolved(value) => println!("Answer: {}", value),
        Answer::Unresolved => println!("Unable to find the answer"),
    }

    Ok(())
}

fn execute(
    session: &mut Session,
    line: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(names) = line.strip_prefix("declare ") {
        session.declare_all(names);
    } else if let Some(link) = line.strip_prefix("link ") {
        let mut parts = link.splitn(2, ':');
        let parent = parts.next().unwrap_or_default().trim();
        let roots: Vec<_> =
            parts.next().unwrap_or_default().split_whitespace().collect();
        session.link_roots(parent, &roots)?;
    } else if let Some(name) = line.strip_prefix("answer ") {
        let name = name.trim();
        session.declare(name);
        session.set_answer(name)?;
    } else {
        session.eq_str(line)?;
    }

    Ok(())
}
