use inquire::error::InquireError;
use inquire::{Confirm, Select, Text};
use kiauh_core::{Answer, Error, Prompter, Result};

/// Terminal prompts. `Esc` goes back everywhere; in text prompts so does typing `b`.
#[derive(Debug, Default)]
pub struct InquirePrompter;

fn finish<T>(result: std::result::Result<T, InquireError>) -> Result<Answer<T>> {
    match result {
        Ok(value) => Ok(Answer::Value(value)),
        Err(InquireError::OperationCanceled) => Ok(Answer::Back),
        Err(InquireError::OperationInterrupted) => Err(Error::Prompt("interrupted".into())),
        Err(e) => Err(Error::Prompt(e.to_string())),
    }
}

fn is_back(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("b")
}

impl Prompter for InquirePrompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<Answer<bool>> {
        finish(Confirm::new(question).with_default(default).prompt())
    }

    fn text(&mut self, question: &str) -> Result<Answer<String>> {
        let input = match finish(Text::new(question).with_help_message("b = back").prompt())? {
            Answer::Value(input) => input,
            Answer::Back => return Ok(Answer::Back),
        };
        if is_back(&input) {
            return Ok(Answer::Back);
        }
        Ok(Answer::Value(input))
    }

    fn number(
        &mut self,
        question: &str,
        min: usize,
        default: Option<usize>,
    ) -> Result<Answer<usize>> {
        let mut prompt = Text::new(question).with_help_message("b = back");
        let default_text = default.map(|d| d.to_string());
        if let Some(d) = &default_text {
            prompt = prompt.with_default(d);
        }
        loop {
            let input = match finish(prompt.clone().prompt())? {
                Answer::Value(input) => input,
                Answer::Back => return Ok(Answer::Back),
            };
            if is_back(&input) {
                return Ok(Answer::Back);
            }
            match input.trim().parse::<usize>() {
                Ok(n) if n >= min => return Ok(Answer::Value(n)),
                _ => log::error!("Invalid input! Enter a number of at least {min}."),
            }
        }
    }

    fn select(&mut self, question: &str, options: &[String]) -> Result<Answer<String>> {
        finish(Select::new(question, options.to_vec()).prompt())
    }
}
