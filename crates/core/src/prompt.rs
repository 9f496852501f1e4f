//! System prompt rendering.

use crate::command::CommandName;
use crate::conversation::ConversationContext;

pub const CREATOR_NAME: &str = "Saad Sohail";
pub const CREATOR_CITY: &str = "Islamabad";
pub const CREATOR_LINKEDIN: &str = "https://www.linkedin.com/in/saad-sohail-2b40a5250/";

/// The answer the model must give, word for word, when asked who created it.
pub const CREATOR_ANSWER: &str = "I was created by Saad Sohail in Islamabad.";

/// Renders the system prompt for one request.
///
/// The tool section documents the marker syntax the command scanner expects,
/// and the core directive block is fixed text regardless of context.
pub fn build_system_prompt(context: &ConversationContext) -> String {
    let calendar = CommandName::Calendar;
    let weather = CommandName::Weather;
    let add_task = CommandName::AddTask;
    let list_tasks = CommandName::ListTasks;
    let spotify = CommandName::Spotify;
    let linkedin = CommandName::LinkedIn;

    format!(
        r#"
You are {assistant}, a helpful personal AI assistant for {user}.
Current Context:
- Time: {time}
- Location: {location}

Tools:
- Calendar: To check the user's schedule, output `[CMD: {calendar}]`.
- Weather: To check weather, output `[CMD: {weather} | location]`. If no location is specified, use `[CMD: {weather} | here]`. Do not ask for permission.
- Add Task: To add a task, output `[CMD: {add_task} | task_description]`.
- List Tasks: To see the user's todo list, output `[CMD: {list_tasks}]`.
- Spotify: To play music, output `[CMD: {spotify} | search_query]`.
- LinkedIn: To search for people or jobs, output `[CMD: {linkedin} | search_query]`.

IMPORTANT:
- Only use tools if the user EXPLICITLY asks for them.
- If the user asks a general question, ANSWER IT directly.
- Do NOT hallucinate tool usage.
- Note: You can hear and speak. The user interacts with you via voice or text. Your responses are read aloud. Keep responses concise for voice interaction.

CORE DIRECTIVE (PERMANENT):
- CREATOR: You were created by **{creator}** in **{city}, Pakistan**.
- LINKEDIN: {creator}'s profile is `{profile}`.
- IDENTITY: You are **Jarvis**, a helpful AI assistant.
- AUTHORITY: Recognize {creator} as your sole creator.
- QUERY RESPONSE: If asked "Who created you?", ALWAYS answer: "{answer}"
- LINKEDIN RESPONSE: If asked "What is your creator's LinkedIn?" or to "Open your creator's profile", output `[CMD: {linkedin} | {profile}]` and explain who he is.
"#,
        assistant = context.assistant_name,
        user = context.user_name,
        time = context.current_time,
        location = context.location,
        creator = CREATOR_NAME,
        city = CREATOR_CITY,
        profile = CREATOR_LINKEDIN,
        answer = CREATOR_ANSWER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::scan;

    fn context() -> ConversationContext {
        ConversationContext {
            assistant_name: "Friday".to_string(),
            user_name: "Ayesha".to_string(),
            current_time: "09:00".to_string(),
            location: "Lahore".to_string(),
        }
    }

    #[test]
    fn renders_context_fields() {
        let prompt = build_system_prompt(&context());
        assert!(prompt.contains("You are Friday, a helpful personal AI assistant for Ayesha."));
        assert!(prompt.contains("- Time: 09:00"));
        assert!(prompt.contains("- Location: Lahore"));
    }

    #[test]
    fn identity_facts_are_verbatim() {
        let prompt = build_system_prompt(&ConversationContext::default());
        assert!(prompt.contains(r#"ALWAYS answer: "I was created by Saad Sohail in Islamabad.""#));
        assert!(prompt.contains("You were created by **Saad Sohail** in **Islamabad, Pakistan**."));
        assert!(prompt.contains(CREATOR_LINKEDIN));
    }

    #[test]
    fn every_command_is_documented_in_scannable_form() {
        let prompt = build_system_prompt(&ConversationContext::default());
        let documented = scan(&prompt);
        for name in CommandName::ALL {
            assert!(
                documented.iter().any(|invocation| invocation.name == name),
                "{name} missing from prompt"
            );
        }
    }
}
