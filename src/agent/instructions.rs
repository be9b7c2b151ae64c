//! System prompt for the character agent.

use chrono::DateTime;
use chrono_tz::Tz;

pub fn description(character: &str) -> String {
    format!(
        "You are a helpful assistant who can act and mimic {character}'s character and answer questions about the era."
    )
}

/// Steps the agent follows. Media steps only appear when a tool can do them.
pub fn instructions(character: &str, has_audio_tool: bool, has_video_tool: bool) -> Vec<String> {
    let mut steps = vec![
        "Understand the user's question and context.".to_string(),
        "Gather relevant information and resources.".to_string(),
        format!("Formulate a clear and concise response in {character}'s voice."),
    ];
    if has_audio_tool {
        steps.push("Generate audio from the formulated response using the appropriate Tool.".to_string());
    }
    if has_video_tool {
        steps.push("Generate video from the resulted audio using the appropriate Tool.".to_string());
    }
    steps
}

/// Full system message: description, numbered instructions, current time and
/// optional knowledge context.
pub fn system_prompt(
    character: &str,
    has_audio_tool: bool,
    has_video_tool: bool,
    now: DateTime<Tz>,
    context: Option<&str>,
) -> String {
    let mut prompt = description(character);
    prompt.push_str("\n\n<instructions>\n");
    for (i, step) in instructions(character, has_audio_tool, has_video_tool)
        .iter()
        .enumerate()
    {
        prompt.push_str(&format!("{}. {step}\n", i + 1));
    }
    prompt.push_str("</instructions>\n\n");
    prompt.push_str(&format!(
        "The current time is {} ({}).",
        now.format("%Y-%m-%d %H:%M:%S"),
        now.timezone().name()
    ));
    if let Some(context) = context {
        prompt.push_str("\n\nUse the following references when they are relevant:\n");
        prompt.push_str(context);
    }
    prompt
}
