#![deny(warnings)]

use chartreuse::{Grammar, Nonterminal, Production, Symbol, ViterbiParser};
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::process::ExitCode;
use std::time::Instant;

/// One parse request: a grammar description plus the sentence to
/// decode and how many trees to keep per chart cell.
#[derive(Deserialize)]
struct Request {
    start_symbol: String,
    rules: Vec<RuleSpec>,
    sentence: String,
    #[serde(default = "default_num_trees")]
    num_trees: usize,
}

fn default_num_trees() -> usize {
    1
}

#[derive(Deserialize)]
struct RuleSpec {
    lhs: String,
    prob: f64,
    rhs: Vec<RhsSpec>,
}

// A rhs slot is either a {"name": ...} category reference or a
// single-character terminal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RhsSpec {
    Category { name: String },
    Letter(String),
}

#[derive(thiserror::Error, Debug)]
enum RequestError {
    #[error("cannot read request: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("terminals must be single characters, got {0:?}")]
    NotALetter(String),
}

impl RuleSpec {
    fn to_production(&self) -> Result<Production<char>, RequestError> {
        let rhs = self
            .rhs
            .iter()
            .map(|item| match item {
                RhsSpec::Category { name } => Ok(Symbol::nonterm(name)),
                RhsSpec::Letter(text) => {
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(tok), None) => Ok(Symbol::Term(tok)),
                        _ => Err(RequestError::NotALetter(text.clone())),
                    }
                }
            })
            .collect::<Result<Vec<_>, RequestError>>()?;
        Ok(Production {
            lhs: Nonterminal::new(&self.lhs),
            rhs,
            prob: self.prob,
        })
    }
}

/// Decode one request into a success envelope. Timing covers the whole
/// request, grammar construction included.
fn respond(input: &str) -> Result<serde_json::Value, RequestError> {
    let started = Instant::now();
    let request: Request = serde_json::from_str(input)?;
    let productions = request
        .rules
        .iter()
        .map(RuleSpec::to_production)
        .collect::<Result<Vec<_>, RequestError>>()?;
    let grammar = Grammar::new(Nonterminal::new(&request.start_symbol), productions);
    let parser = ViterbiParser::new(grammar);

    let sentence: Vec<char> = request.sentence.chars().collect();
    let trees = parser.parse_top_k(&sentence, request.num_trees);
    log::info!(
        "{} tree(s) for {:?} in {:?}",
        trees.len(),
        request.sentence,
        started.elapsed()
    );

    Ok(json!({
        "status": "success",
        "elapsed_ms": started.elapsed().as_millis() as u64,
        "trees": trees.iter().map(|tree| tree.to_json()).collect::<Vec<_>>(),
    }))
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();

    let mut input = String::new();
    let result = match std::io::stdin().read_to_string(&mut input) {
        Ok(_) => respond(&input),
        Err(err) => Err(err.into()),
    };
    match result {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", json!({"status": "error", "message": err.to_string()}));
            eprintln!("Uncaught error:\n{}", err);
            ExitCode::FAILURE
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
