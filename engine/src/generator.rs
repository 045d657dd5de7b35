//! Quiz generation from templates.
//!
//! Question templates may reference variables as `{{name}}`. Each generated
//! question draws one value per variable and substitutes it into the text,
//! options, answer key and feedback. Unknown placeholders are left intact.

use crate::{
    quiz::{Answer, Feedback, Question, QuestionType, QuizConfig},
    Error, QuestionId, QuizId, Result,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizTemplate {
    pub id: QuizId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub passing_score: u32,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    pub question_templates: Vec<QuestionTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTemplate {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub text_template: String,
    #[serde(default)]
    pub options_template: Vec<String>,
    pub correct_answer_template: Answer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_template: Option<Feedback>,
    pub points: u32,
    /// Candidate values per variable name.
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<Value>>,
}

/// Build a quiz, shuffling question order when the template asks for it.
pub fn generate_quiz<R: Rng + ?Sized>(template: &QuizTemplate, rng: &mut R) -> Result<QuizConfig> {
    info!(template = %template.id, "Generating quiz from template");

    let mut questions = template
        .question_templates
        .iter()
        .map(|t| generate_question(t, rng))
        .collect::<Result<Vec<_>>>()?;

    if template.randomize {
        questions.shuffle(rng);
    }

    Ok(QuizConfig {
        id: template.id.clone(),
        title: template.title.clone(),
        description: template.description.clone(),
        passing_score: template.passing_score,
        randomize: template.randomize,
        max_attempts: template.max_attempts,
        time_limit: template.time_limit,
        questions,
    })
}

pub fn generate_question<R: Rng + ?Sized>(
    template: &QuestionTemplate,
    rng: &mut R,
) -> Result<Question> {
    debug!(template = %template.id, "Generating question from template");

    let mut bindings = BTreeMap::new();
    for (name, values) in &template.variables {
        let value = values.choose(rng).ok_or_else(|| {
            Error::InvalidTemplate(format!(
                "variable {name} in question {} has no values",
                template.id
            ))
        })?;
        bindings.insert(name.as_str(), value_text(value));
    }

    let fill = |text: &str| replace_variables(text, &bindings);
    let correct_answer = match &template.correct_answer_template {
        Answer::Single(s) => Answer::Single(fill(s)),
        Answer::Multiple(v) => Answer::Multiple(v.iter().map(|s| fill(s)).collect()),
    };
    let feedback = template.feedback_template.as_ref().map(|f| Feedback {
        correct: f.correct.as_deref().map(fill),
        incorrect: f.incorrect.as_deref().map(fill),
    });

    Ok(Question {
        id: template.id.clone(),
        kind: template.kind,
        text: fill(&template.text_template),
        options: template.options_template.iter().map(|o| fill(o)).collect(),
        correct_answer,
        feedback,
        points: template.points,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{{name}}` placeholders whose name is a run of word characters.
pub fn replace_variables(text: &str, bindings: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let name_len = after
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];
        let closes = after[name_len..].starts_with("}}");
        match bindings.get(name) {
            Some(value) if closes && !name.is_empty() => {
                out.push_str(value);
                rest = &after[name_len + 2..];
            }
            _ => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn bindings(pairs: &[(&'static str, &str)]) -> BTreeMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn replaces_known_placeholders() {
        let b = bindings(&[("a", "2"), ("b", "3")]);
        assert_eq!(replace_variables("{{a}} + {{b}} = ?", &b), "2 + 3 = ?");
    }

    #[test]
    fn leaves_unknown_placeholders() {
        let b = bindings(&[("a", "2")]);
        assert_eq!(replace_variables("{{a}} {{c}} {{ a }}", &b), "2 {{c}} {{ a }}");
        assert_eq!(replace_variables("open {{a", &b), "open {{a");
    }

    fn addition_template() -> QuestionTemplate {
        QuestionTemplate {
            id: "sum".into(),
            kind: QuestionType::FillIn,
            text_template: "What is {{x}} plus {{x}}?".into(),
            options_template: Vec::new(),
            correct_answer_template: Answer::Single("twice {{x}}".into()),
            feedback_template: Some(Feedback {
                correct: Some("Yes, twice {{x}}".into()),
                incorrect: None,
            }),
            points: 1,
            variables: BTreeMap::from([("x".to_string(), vec![json!(4), json!("four")])]),
        }
    }

    #[test]
    fn question_uses_one_value_per_variable() {
        let mut rng = StdRng::seed_from_u64(7);
        let q = generate_question(&addition_template(), &mut rng).unwrap();
        let value = if q.text.contains("four") { "four" } else { "4" };
        assert_eq!(q.text, format!("What is {value} plus {value}?"));
        assert_eq!(q.correct_answer, Answer::Single(format!("twice {value}")));
        let feedback = q.feedback.unwrap();
        assert_eq!(feedback.correct, Some(format!("Yes, twice {value}")));
        assert_eq!(feedback.incorrect, None);
    }

    #[test]
    fn empty_variable_is_rejected() {
        let mut template = addition_template();
        template.variables.insert("y".into(), Vec::new());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            generate_question(&template, &mut rng),
            Err(Error::InvalidTemplate(_))
        ));
    }

    #[test]
    fn randomized_quiz_keeps_every_question() {
        let template = QuizTemplate {
            id: "gen".into(),
            title: "Generated".into(),
            description: None,
            passing_score: 50,
            randomize: true,
            max_attempts: None,
            time_limit: None,
            question_templates: (0..8)
                .map(|i| QuestionTemplate {
                    id: format!("q{i}"),
                    variables: BTreeMap::new(),
                    ..addition_template()
                })
                .collect(),
        };
        let mut rng = StdRng::seed_from_u64(42);
        let quiz = generate_quiz(&template, &mut rng).unwrap();
        let mut ids: Vec<_> = quiz.questions.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let expected: Vec<_> = (0..8).map(|i| format!("q{i}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(quiz.passing_score, 50);
    }
}
