use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Error as TeraError, Tera};

const STORY_TEMPLATE: &str = include_str!("prompts/story.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// The instruction sent upstream when a story is requested
pub fn story_instruction(topic: &str) -> Result<String, TeraError> {
    let mut context = HashMap::new();
    context.insert("topic", topic);
    load_prompt(STORY_TEMPLATE, &context)
}
