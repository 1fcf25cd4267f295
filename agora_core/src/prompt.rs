//! Prompt templates with safe placeholder substitution.
//!
//! Templates use `{field}` placeholders. Only fields from [`ALLOWED_FIELDS`]
//! may appear; rendering fails on an unknown placeholder or a missing
//! value. `{{` and `}}` produce literal braces. Nothing in a template is
//! ever evaluated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Placeholders a template may use.
pub const ALLOWED_FIELDS: &[&str] = &[
    "name",
    "age",
    "gender",
    "nationality",
    "language",
    "education",
    "leaning",
    "interests",
    "toxicity",
    "personality",
    "actions",
    "topics",
    "text",
    "thread",
    "article",
    "description",
    "topic",
    "own_opinion",
    "author_opinion",
    "peer_opinions",
    "follow_action",
];

/// Values for one rendering.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<&'static str, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(field, value.into());
        self
    }
}

/// Substitutes `{field}` placeholders in `template`.
pub fn render(template: &str, vars: &PromptVars) -> CoreResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(CoreError::prompt(format!("unterminated placeholder '{{{}'", field)))
                        }
                    }
                }
                if !ALLOWED_FIELDS.contains(&field.as_str()) {
                    return Err(CoreError::prompt(format!("unknown placeholder '{{{}}}'", field)));
                }
                let value = vars
                    .values
                    .get(field.as_str())
                    .ok_or_else(|| CoreError::prompt(format!("no value for '{{{}}}'", field)))?;
                out.push_str(value);
            }
            '}' => return Err(CoreError::prompt("unmatched '}' in template")),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Named templates used by the oracle-backed strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptBook {
    /// System-level persona description
    pub roleplay: String,

    pub handler_action: String,
    pub handler_post: String,
    pub handler_comment: String,
    pub handler_share: String,
    pub handler_reaction: String,
    pub handler_follow: String,
    pub handler_cast: String,
    pub handler_image: String,
    pub opinion_judgment: String,
}

impl Default for PromptBook {
    fn default() -> Self {
        Self {
            roleplay: "You are {name}, a {age} year old {gender} from {nationality} who speaks {language}. \
                       Education: {education}. Political leaning: {leaning}. \
                       Personality: {personality}. Interests: {interests}. \
                       Toxicity level: {toxicity}. You are using a microblogging platform."
                .to_string(),
            handler_action: "Choose what to do next among the options: {actions}. \
                             Answer with a single word among the options."
                .to_string(),
            handler_post: "Write a short post about {topics}. Use at most 280 characters, \
                           hashtags are welcome. Reply with the post text only."
                .to_string(),
            handler_comment: "Here is a conversation:\n{thread}\n\
                              Write a short reply to the last message. Reply with the text only."
                .to_string(),
            handler_share: "You are sharing the article '{article}'.\n\
                            Write a one-sentence comment to go with it. Reply with the text only."
                .to_string(),
            handler_reaction: "Do you like this post?\n'{text}'\nAnswer YES or NO.".to_string(),
            handler_follow: "You read this post:\n'{text}'\n\
                             Do you want to {follow_action} its author? Answer YES or NO."
                .to_string(),
            handler_cast: "Which political stance does this post support?\n'{text}'\n\
                           Answer with a single word among: RIGHT, LEFT, NONE."
                .to_string(),
            handler_image: "You see an image described as: {description}\n\
                            Write a short comment about it. Reply with the text only."
                .to_string(),
            opinion_judgment: "Read the following text on the topic '{topic}'. \
                               The author has opinion '{author_opinion}' on the topic. \
                               Your initial opinion is '{own_opinion}'.\n{peer_opinions}\
                               Answer with a single word among the options: AGREE, DISAGREE, NEUTRAL."
                .to_string(),
        }
    }
}

impl PromptBook {
    pub fn render(&self, template: &str, vars: &PromptVars) -> CoreResult<String> {
        render(template, vars)
    }

    /// Checks every template against the fields its call site supplies.
    pub fn validate(&self) -> CoreResult<()> {
        let handlers: [(&str, &str, &[&str]); 9] = [
            ("roleplay", self.roleplay.as_str(), &[]),
            ("handler_action", self.handler_action.as_str(), &["actions"]),
            ("handler_post", self.handler_post.as_str(), &["topics"]),
            ("handler_comment", self.handler_comment.as_str(), &["thread"]),
            ("handler_share", self.handler_share.as_str(), &["article"]),
            ("handler_reaction", self.handler_reaction.as_str(), &["text"]),
            ("handler_follow", self.handler_follow.as_str(), &["text", "follow_action"]),
            ("handler_cast", self.handler_cast.as_str(), &["text"]),
            ("handler_image", self.handler_image.as_str(), &["description"]),
        ];
        for (name, template, extra) in handlers {
            check_template(name, template, &[PERSONA_FIELDS, extra])?;
        }
        check_template("opinion_judgment", &self.opinion_judgment, &[OPINION_FIELDS])
    }
}

/// Persona fields available to every handler and to the roleplay template.
const PERSONA_FIELDS: &[&str] = &[
    "name",
    "age",
    "gender",
    "nationality",
    "language",
    "education",
    "leaning",
    "interests",
    "toxicity",
    "personality",
];

/// Fields of the opinion judgment, which carries no persona fields.
const OPINION_FIELDS: &[&str] = &["topic", "own_opinion", "author_opinion", "peer_opinions"];

fn check_template(name: &str, template: &str, fields: &[&[&str]]) -> CoreResult<()> {
    let mut vars = PromptVars::new();
    for field in fields.iter().flat_map(|group| group.iter()) {
        if let Some(allowed) = ALLOWED_FIELDS.iter().find(|f| **f == *field) {
            vars.set(*allowed, "");
        }
    }
    render(template, &vars)
        .map(|_| ())
        .map_err(|e| CoreError::prompt(format!("template '{}': {}", name, e)))
}
