use log::error;

use crate::error::Result;
use crate::instance::{is_valid_name, Instance};

/// A prompt either yields a value or the operator asked to go back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer<T> {
    Value(T),
    Back,
}

impl<T> Answer<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Answer<U> {
        match self {
            Answer::Value(v) => Answer::Value(f(v)),
            Answer::Back => Answer::Back,
        }
    }
}

/// Unwrap an `Answer`, returning `Ok(Answer::Back)` from the enclosing function on go-back.
#[macro_export]
macro_rules! answer {
    ($e:expr) => {
        match $e {
            $crate::input::Answer::Value(v) => v,
            $crate::input::Answer::Back => return Ok($crate::input::Answer::Back),
        }
    };
}

/// Interactive operator input. Every prompt can be answered with "go back".
pub trait Prompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<Answer<bool>>;
    fn text(&mut self, question: &str) -> Result<Answer<String>>;
    fn number(
        &mut self,
        question: &str,
        min: usize,
        default: Option<usize>,
    ) -> Result<Answer<usize>>;
    fn select(&mut self, question: &str, options: &[String]) -> Result<Answer<String>>;
}

/// Ask for a name until one is given that is well-formed and not in `exclude`
/// (compared case-insensitively).
pub fn get_string_input(
    prompter: &mut dyn Prompter,
    question: &str,
    exclude: &[String],
) -> Result<Answer<String>> {
    loop {
        let input = answer!(prompter.text(question)?);
        let input = input.trim().to_string();
        if !is_valid_name(&input) {
            error!("Invalid input! Only letters, digits and '_' are allowed.");
            continue;
        }
        if exclude.iter().any(|e| e.eq_ignore_ascii_case(&input)) {
            error!("This value is already in use/reserved.");
            continue;
        }
        return Ok(Answer::Value(input));
    }
}

/// Ask for a number until one `>= min` is given.
pub fn get_number_input(
    prompter: &mut dyn Prompter,
    question: &str,
    min: usize,
    default: Option<usize>,
) -> Result<Answer<usize>> {
    loop {
        let n = answer!(prompter.number(question, min, default)?);
        if n < min {
            error!("Invalid input! Minimum is {min}.");
            continue;
        }
        return Ok(Answer::Value(n));
    }
}

/// Pick one instance (`1..n`), all of them (`a`) or go back (`b`).
pub fn select_instances(
    prompter: &mut dyn Prompter,
    question: &str,
    instances: &[Instance],
) -> Result<Answer<Vec<Instance>>> {
    let mut options: Vec<String> = instances
        .iter()
        .enumerate()
        .map(|(i, instance)| format!("{}: {}", i + 1, instance.service_name()))
        .collect();
    options.push("a: all".to_string());
    options.push("b: back".to_string());

    loop {
        let choice = answer!(prompter.select(question, &options)?);
        let key = choice.split(':').next().unwrap_or_default().trim().to_ascii_lowercase();
        match key.as_str() {
            "a" => return Ok(Answer::Value(instances.to_vec())),
            "b" => return Ok(Answer::Back),
            n => match n.parse::<usize>() {
                Ok(n) if (1..=instances.len()).contains(&n) => {
                    return Ok(Answer::Value(vec![instances[n - 1].clone()]))
                }
                _ => error!("Invalid input!"),
            },
        }
    }
}

/// A `Prompter` that replays canned answers, for tests and non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<Answer<String>>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|a| {
                    let a = a.into();
                    if a == "<back>" {
                        Answer::Back
                    } else {
                        Answer::Value(a)
                    }
                })
                .collect(),
            asked: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next(&mut self, question: &str) -> Result<Answer<String>> {
        self.asked.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| crate::Error::Prompt(format!("no scripted answer for '{question}'")))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<Answer<bool>> {
        Ok(self.next(question)?.map(|a| match a.to_ascii_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        }))
    }

    fn text(&mut self, question: &str) -> Result<Answer<String>> {
        self.next(question)
    }

    fn number(
        &mut self,
        question: &str,
        _min: usize,
        default: Option<usize>,
    ) -> Result<Answer<usize>> {
        let answer = self.next(question)?;
        Ok(answer.map(|a| a.trim().parse().ok().or(default).unwrap_or(0)))
    }

    fn select(&mut self, question: &str, _options: &[String]) -> Result<Answer<String>> {
        self.next(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_input_reprompts_on_excluded_and_malformed_names() {
        let mut p = ScriptedPrompter::new(["MCU", "bad name", "voron"]);
        let exclude = vec!["mcu".to_string()];
        let got = get_string_input(&mut p, "Name", &exclude).unwrap();
        assert_eq!(got, Answer::Value("voron".to_string()));
        assert_eq!(p.asked.len(), 3);
    }

    #[test]
    fn number_input_enforces_minimum() {
        let mut p = ScriptedPrompter::new(["0", "", "4"]);
        assert_eq!(get_number_input(&mut p, "Count", 1, Some(1)).unwrap(), Answer::Value(1));
        assert_eq!(p.remaining(), 1);
    }

    #[test]
    fn selects_one_or_all_instances() {
        let paths = crate::paths::Paths::from_home(std::path::Path::new("/home/pi"), "pi");
        let family: Vec<Instance> = ["1", "2"]
            .iter()
            .map(|s| Instance::new(crate::instance::Component::Moonraker, s, &paths))
            .collect();

        let mut p = ScriptedPrompter::new(["7", "2: moonraker-2"]);
        let picked = select_instances(&mut p, "Select", &family).unwrap();
        assert_eq!(picked, Answer::Value(vec![family[1].clone()]));

        let mut p = ScriptedPrompter::new(["a"]);
        assert_eq!(
            select_instances(&mut p, "Select", &family).unwrap(),
            Answer::Value(family.clone())
        );

        let mut p = ScriptedPrompter::new(["b"]);
        assert_eq!(select_instances(&mut p, "Select", &family).unwrap(), Answer::Back);
    }

    #[test]
    fn go_back_is_propagated() {
        let mut p = ScriptedPrompter::new(["<back>"]);
        assert_eq!(get_string_input(&mut p, "Name", &[]).unwrap(), Answer::Back);
    }
}
