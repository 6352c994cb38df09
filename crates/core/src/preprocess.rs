//! Text-level conditional-compilation preprocessor.
//!
//! Runs before parsing, over raw source lines. Directives are whole-line
//! comments (`// #define NAME[=VALUE]`, `// #if COND`, `// #ifdef NAME`,
//! `// #ifndef NAME`, `// #else`, `// #endif`, `// #error MESSAGE`).
//! Conditions support `defined(NAME)` / `!defined(NAME)` plus arithmetic and
//! boolean operators over defined values. Dropped lines leave empty lines
//! behind so later parse errors still point at the right place.
//!
//! Unterminated `#if` blocks and unknown directives warn rather than abort;
//! only `#error` (in an active branch) is fatal.

use crate::result::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Preprocessor variables: a name may be defined with or without a value.
pub type Defines = HashMap<String, Option<String>>;

struct Frame {
    parent_active: bool,
    active: bool,
    /// Some branch of this if/else chain has already been taken.
    taken: bool,
}

/// Apply preprocessor directives and strip a leading shebang.
pub fn process(code: &str, variables: &Defines) -> Result<String> {
    let code = process_directives(code, variables)?;
    Ok(remove_shebang(&code))
}

fn process_directives(code: &str, variables: &Defines) -> Result<String> {
    let directive_re = directive_regex();
    let define_re = define_regex();

    let mut defines: HashMap<String, Option<f64>> = HashMap::new();
    defines.insert("true".to_string(), Some(1.0));
    defines.insert("false".to_string(), Some(0.0));
    for (name, value) in variables {
        defines.insert(name.clone(), value.as_deref().map(parse_define_value));
    }

    let lines: Vec<&str> = code.split('\n').collect();
    let mut output: Vec<String> = vec![String::new(); lines.len()];
    let mut stack: Vec<Frame> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let active = stack.iter().all(|frame| frame.active);

        let Some(captures) = directive_re.captures(line) else {
            if active {
                output[i] = line.to_string();
            }
            continue;
        };
        let directive = &captures[1];
        let parameters = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        match directive {
            "define" => {
                if active {
                    let Some(parts) = define_re.captures(parameters) else {
                        warn!("malformed #define: {parameters}");
                        continue;
                    };
                    let name = parts[1].to_string();
                    let value = parts.get(2).map(|m| parse_define_value(m.as_str()));
                    defines.insert(name, value);
                }
            }
            "error" => {
                if active {
                    return Err(Error::Preprocessor(parameters.to_string()));
                }
            }
            "if" | "ifdef" | "ifndef" => {
                let condition = match directive {
                    "if" => parameters.to_string(),
                    "ifdef" => format!("defined({parameters})"),
                    _ => format!("!defined({parameters})"),
                };
                let taken = active && eval_condition(&condition, &defines);
                stack.push(Frame { parent_active: active, active: taken, taken });
            }
            "else" => match stack.last_mut() {
                Some(frame) => {
                    frame.active = frame.parent_active && !frame.taken;
                    frame.taken = true;
                }
                None => warn!("#else without matching #if"),
            },
            "endif" => {
                if stack.pop().is_none() {
                    warn!("#endif without matching #if");
                }
            }
            other => {
                warn!("Unknown preprocessor directive #{other}");
            }
        }
    }

    if !stack.is_empty() {
        warn!("unterminated #if block (preprocessor directive closing tag missing?)");
    }

    Ok(output.join("\n"))
}

fn directive_regex() -> Regex {
    Regex::new(r"^\s*//\s*#(\w+)\s*(.+)?$").expect("constant pattern")
}

fn define_regex() -> Regex {
    Regex::new(r"^([\w\d]+)\s*(?:=\s*([\w\d.]+))?$").expect("constant pattern")
}

fn parse_define_value(raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or_else(|_| {
        warn!("non-numeric preprocessor value '{raw}' treated as 0");
        0.0
    })
}

fn remove_shebang(code: &str) -> String {
    if code.starts_with("#!") {
        match code.split_once('\n') {
            Some((_, rest)) => rest.to_string(),
            None => String::new(),
        }
    } else {
        code.to_string()
    }
}

/// Evaluate a directive condition to a boolean.
///
/// `defined(NAME)` / `!defined(NAME)` are substituted textually first, the
/// way the condition language defines them, then the remainder is parsed by a
/// small precedence-climbing evaluator over numbers and defined names.
fn eval_condition(condition: &str, defines: &HashMap<String, Option<f64>>) -> bool {
    let not_defined = Regex::new(r"!defined\(([\w\d]+)\)").expect("constant pattern");
    let defined = Regex::new(r"defined\(([\w\d]+)\)").expect("constant pattern");
    let mut text = condition.to_string();
    text = not_defined
        .replace_all(&text, |c: &regex::Captures<'_>| {
            if defines.contains_key(&c[1]) { "false" } else { "true" }
        })
        .into_owned();
    text = defined
        .replace_all(&text, |c: &regex::Captures<'_>| {
            if defines.contains_key(&c[1]) { "true" } else { "false" }
        })
        .into_owned();

    let mut eval = CondEval { src: text.as_bytes(), pos: 0, defines };
    let value = eval.parse_or();
    eval.skip_ws();
    if eval.pos < eval.src.len() {
        warn!("trailing characters in preprocessor condition '{condition}'");
    }
    value != 0.0
}

struct CondEval<'a> {
    src: &'a [u8],
    pos: usize,
    defines: &'a HashMap<String, Option<f64>>,
}

impl<'a> CondEval<'a> {
    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(s.as_bytes()) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn peek_is(&mut self, s: &str) -> bool {
        self.skip_ws();
        self.src[self.pos..].starts_with(s.as_bytes())
    }

    fn parse_or(&mut self) -> f64 {
        let mut left = self.parse_and();
        while self.peek_is("||") {
            self.eat("||");
            let right = self.parse_and();
            left = f64::from(left != 0.0 || right != 0.0);
        }
        left
    }

    fn parse_and(&mut self) -> f64 {
        let mut left = self.parse_cmp();
        while self.peek_is("&&") {
            self.eat("&&");
            let right = self.parse_cmp();
            left = f64::from(left != 0.0 && right != 0.0);
        }
        left
    }

    fn parse_cmp(&mut self) -> f64 {
        let left = self.parse_add();
        for op in ["==", "!=", "<=", ">=", "<", ">"] {
            if self.peek_is(op) {
                self.eat(op);
                let right = self.parse_add();
                return f64::from(match op {
                    "==" => left == right,
                    "!=" => left != right,
                    "<=" => left <= right,
                    ">=" => left >= right,
                    "<" => left < right,
                    _ => left > right,
                });
            }
        }
        left
    }

    fn parse_add(&mut self) -> f64 {
        let mut left = self.parse_mul();
        loop {
            if self.peek_is("+") {
                self.eat("+");
                left += self.parse_mul();
            } else if self.peek_is("-") {
                self.eat("-");
                left -= self.parse_mul();
            } else {
                return left;
            }
        }
    }

    fn parse_mul(&mut self) -> f64 {
        let mut left = self.parse_unary();
        loop {
            if self.peek_is("*") {
                self.eat("*");
                left *= self.parse_unary();
            } else if self.peek_is("/") {
                self.eat("/");
                let right = self.parse_unary();
                left = if right == 0.0 { 0.0 } else { left / right };
            } else if self.peek_is("%") {
                self.eat("%");
                let right = self.parse_unary();
                left = if right == 0.0 { 0.0 } else { left % right };
            } else {
                return left;
            }
        }
    }

    fn parse_unary(&mut self) -> f64 {
        if self.eat("!") {
            return f64::from(self.parse_unary() == 0.0);
        }
        if self.eat("-") {
            return -self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> f64 {
        self.skip_ws();
        if self.eat("(") {
            let value = self.parse_or();
            if !self.eat(")") {
                warn!("missing ')' in preprocessor condition");
            }
            return value;
        }

        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            warn!("empty operand in preprocessor condition");
            return 0.0;
        }
        let word = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        if let Ok(number) = word.parse::<f64>() {
            return number;
        }
        match self.defines.get(&word) {
            Some(Some(value)) => *value,
            Some(None) => {
                warn!("preprocessor variable '{word}' has no value; treated as 0");
                0.0
            }
            None => {
                warn!("undefined preprocessor variable '{word}' treated as 0");
                0.0
            }
        }
    }
}
