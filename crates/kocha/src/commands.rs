//! The command surface: what a message's `content` asks the server to do.
//!
//! Parsing is pure and separate from the session loop so the priority
//! rules can be tested without any connection.

/// Prefix of the pre-login command.
pub const LOGIN_PREFIX: &str = "/login ";

/// Prefix of the direct-message command.
pub const DM_PREFIX: &str = "/dm ";

/// Every server reply to a rejected `/login` starts with this.
pub const LOGIN_REJECTED_PREFIX: &str = "Login failed: ";

/// Text sent in reply to `/h` and `/help`.
pub const HELP_TEXT: &str = "List of available commands:\n\
/h or /help          -- Show this list\n\
/q or /quit          -- Exit the KOCHA chat\n\
/l or /list          -- Show a list of all other members\n\
/m or /members       -- Show a list of all other members\n\
/dm <user> <message> -- Write a direct message";

/// Greeting sent after a successful login.
pub fn welcome_text(alias: &str) -> String {
    format!(
        "Hello {alias}! Welcome to the KOCHA chat. \
         Type /h or /help to display a list of available commands."
    )
}

/// Extracts the alias from a `/login <alias>` message.
///
/// Returns `None` if the content is not a login command at all. The
/// alias is returned as typed (minus surrounding whitespace), so
/// `/login a b` yields `"a b"` and is rejected by the alias rules rather
/// than silently logging in as `a`.
pub fn parse_login(content: &str) -> Option<&str> {
    content.strip_prefix(LOGIN_PREFIX).map(str::trim)
}

/// A command available once logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/h`, `/help`
    Help,
    /// `/q`, `/quit`
    Quit,
    /// `/l`, `/list`, `/m`, `/members`
    Members,
    /// `/dm <to> <text>`
    DirectMessage { to: &'a str, text: &'a str },
    /// `/dm` without a recipient or without text. Dropped.
    IncompleteDirectMessage,
    /// Anything else: broadcast to every other member.
    Chat,
}

impl<'a> Command<'a> {
    /// Classifies message content, in fixed priority order: exact
    /// commands first, then the `/dm ` prefix, then chat.
    pub fn parse(content: &'a str) -> Self {
        match content {
            "/h" | "/help" => return Self::Help,
            "/q" | "/quit" => return Self::Quit,
            "/l" | "/list" | "/m" | "/members" => return Self::Members,
            _ => {}
        }

        let Some(rest) = content.strip_prefix(DM_PREFIX) else {
            return Self::Chat;
        };

        match rest.trim_start().split_once(char::is_whitespace) {
            Some((to, text)) if !text.trim().is_empty() => Self::DirectMessage {
                to,
                text: text.trim_start(),
            },
            _ => Self::IncompleteDirectMessage,
        }
    }
}
