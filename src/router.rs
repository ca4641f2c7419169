//! Mapping of incoming chat events to request envelopes.
//!
//! Routing is pure: no I/O, no quota. The gateway decides what to do with
//! the resulting [`RequestEnvelope`].

use teloxide::utils::command::{BotCommands, ParseError};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Treasure Hunter Bot commands:")]
pub enum Command {
    /// Start the bot and show the welcome message
    #[command(description = "Start the bot and get the welcome message.")]
    Start,
    /// Show all commands
    #[command(description = "Show this help message.")]
    Help,
    /// Explain how to upload a photo for analysis
    #[command(description = "Analyze an uploaded image for treasure hunting signals.")]
    Analyze,
    /// Ask a free-form question
    #[command(description = "Ask a treasure hunting question.")]
    Ask(String),
    /// Describe a detector signal
    #[command(description = "Describe a metal detecting signal for analysis.")]
    Signal(String),
    /// General tips, or a tips question
    #[command(description = "Get general treasure hunting tips.")]
    Tips(String),
    /// Equipment recommendations, or an equipment question
    #[command(description = "Get equipment recommendations.")]
    Equipment(String),
    /// Legal guidelines, or a legal question
    #[command(description = "Get legal and ethical guidelines.")]
    Legal(String),
    /// Safety guidelines, or a safety question
    #[command(description = "Get safety guidelines for treasure hunting.")]
    Safety(String),
    /// Show bot statistics
    #[command(description = "Show bot statistics.")]
    Stats,
}

/// Knowledge-base sections served by the topic commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// General hunting tips
    Tips,
    /// Detectors and accessories
    Equipment,
    /// Permissions, laws and ethics
    Legal,
    /// Personal and field safety
    Safety,
}

impl Topic {
    /// Human-readable subject used in prompts and headers
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::Tips => "general treasure hunting technique",
            Self::Equipment => "metal detecting equipment",
            Self::Legal => "treasure hunting law and ethics",
            Self::Safety => "treasure hunting safety",
        }
    }
}

/// The three AI-backed features advertised in help texts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Photo analysis
    Analyze,
    /// Questions and answers
    Ask,
    /// Detector signal interpretation
    Signal,
}

/// Inline keyboard buttons and their callback payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuickAction {
    /// Explain photo analysis
    HelpAnalyze,
    /// Explain asking questions
    HelpAsk,
    /// Explain signal analysis
    HelpSignal,
    /// Show the tips guide
    Tips,
    /// Show the equipment guide
    Equipment,
}

/// Buttons attached to the welcome message
pub const WELCOME_ACTIONS: &[QuickAction] = &[
    QuickAction::HelpAnalyze,
    QuickAction::HelpAsk,
    QuickAction::HelpSignal,
    QuickAction::Tips,
];

/// Buttons offered after an image analysis
pub const FOLLOW_UP_ACTIONS: &[QuickAction] = &[
    QuickAction::HelpAsk,
    QuickAction::Tips,
    QuickAction::Equipment,
];

impl QuickAction {
    /// Payload sent back by Telegram when the button is pressed
    #[must_use]
    pub const fn callback_data(self) -> &'static str {
        match self {
            Self::HelpAnalyze => "help_analyze",
            Self::HelpAsk => "help_ask",
            Self::HelpSignal => "help_signal",
            Self::Tips => "tips",
            Self::Equipment => "equipment",
        }
    }

    /// Button caption
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HelpAnalyze => "📸 Analyze Image",
            Self::HelpAsk => "❓ Ask Question",
            Self::HelpSignal => "📊 Signal Analysis",
            Self::Tips => "💡 Get Tips",
            Self::Equipment => "🛠️ Equipment Help",
        }
    }

    /// Inverse of [`QuickAction::callback_data`]
    #[must_use]
    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            "help_analyze" => Some(Self::HelpAnalyze),
            "help_ask" => Some(Self::HelpAsk),
            "help_signal" => Some(Self::HelpSignal),
            "tips" => Some(Self::Tips),
            "equipment" => Some(Self::Equipment),
            _ => None,
        }
    }
}

/// Chat input, stripped of Telegram specifics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A recognized command
    Command(Command),
    /// A slash command the bot does not know
    UnknownCommand(String),
    /// Plain text
    Text(String),
    /// A photo, identified by its largest size's file id
    Photo {
        /// Telegram file id
        file_id: String,
        /// Optional caption, used as the user's question
        caption: Option<String>,
    },
    /// Inline keyboard press
    Callback(String),
}

impl Event {
    /// Classify a text message.
    ///
    /// Returns `None` for commands addressed to a different bot.
    ///
    /// # Examples
    ///
    /// ```
    /// use treasure_hunter_bot::router::{Command, Event};
    ///
    /// let event = Event::from_text("/ask Where to dig?", "hunter_bot");
    /// assert_eq!(event, Some(Event::Command(Command::Ask("Where to dig?".into()))));
    /// assert_eq!(Event::from_text("/ask@other_bot hi", "hunter_bot"), None);
    /// ```
    #[must_use]
    pub fn from_text(text: &str, bot_username: &str) -> Option<Self> {
        if !text.starts_with('/') {
            return Some(Self::Text(text.to_string()));
        }
        match Command::parse(text, bot_username) {
            Ok(command) => Some(Self::Command(command)),
            Err(ParseError::WrongBotName(_)) => None,
            Err(_) => {
                let name = text
                    .split_whitespace()
                    .next()
                    .and_then(|token| token.split('@').next())
                    .unwrap_or(text);
                Some(Self::UnknownCommand(name.to_string()))
            }
        }
    }
}

/// Replies that need no inference call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticReply {
    /// Welcome message with the quick-action keyboard
    Welcome,
    /// Command list and tips
    Help,
    /// How to use a feature, for commands sent without arguments
    Usage(Feature),
    /// Short feature explanation behind a keyboard button
    ButtonHelp(Feature),
    /// A knowledge-base section
    Guide(Topic),
    /// Nudge for non-question chatter
    Greeting,
    /// Unknown command or callback
    Fallback {
        /// Offending command, if the input was one
        command: Option<String>,
    },
    /// Runtime counters
    Stats,
}

impl StaticReply {
    /// Keyboard attached to this reply, if any
    #[must_use]
    pub const fn actions(&self) -> Option<&'static [QuickAction]> {
        match self {
            Self::Welcome => Some(WELCOME_ACTIONS),
            _ => None,
        }
    }
}

/// What the gateway has to do for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEnvelope {
    /// Answer a question
    Ask(String),
    /// Interpret a signal description
    Signal(String),
    /// Download and analyze a photo
    Analyze {
        /// Telegram file id
        file_id: String,
        /// User's caption
        caption: Option<String>,
    },
    /// Answer a question within one knowledge-base topic
    TopicQuestion {
        /// Topic the question belongs to
        topic: Topic,
        /// The question itself
        question: String,
    },
    /// Send a canned reply
    Reply(StaticReply),
}

impl RequestEnvelope {
    /// True when handling this envelope costs an inference call
    #[must_use]
    pub const fn needs_inference(&self) -> bool {
        !matches!(self, Self::Reply(_))
    }

    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::Signal(_) => "signal",
            Self::Analyze { .. } => "analyze",
            Self::TopicQuestion { .. } => "topic_question",
            Self::Reply(_) => "reply",
        }
    }
}

/// Words that mark plain text as a question
const QUESTION_WORDS: &[&str] = &[
    "what", "how", "where", "when", "why", "which", "can", "should", "help",
];

/// Heuristic for free text: a question mark or a question word.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::router::looks_like_question;
///
/// assert!(looks_like_question("Which coil for wet sand"));
/// assert!(!looks_like_question("Found a button today"));
/// ```
#[must_use]
pub fn looks_like_question(text: &str) -> bool {
    text.contains('?')
        || text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| QUESTION_WORDS.iter().any(|q| word.eq_ignore_ascii_case(q)))
}

/// Map an event to its envelope.
#[must_use]
pub fn route(event: Event) -> RequestEnvelope {
    match event {
        Event::Command(command) => route_command(command),
        Event::UnknownCommand(command) => RequestEnvelope::Reply(StaticReply::Fallback {
            command: Some(command),
        }),
        Event::Text(text) => {
            let text = text.trim();
            if !text.is_empty() && looks_like_question(text) {
                RequestEnvelope::Ask(text.to_string())
            } else {
                RequestEnvelope::Reply(StaticReply::Greeting)
            }
        }
        Event::Photo { file_id, caption } => RequestEnvelope::Analyze {
            file_id,
            caption: caption
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        },
        Event::Callback(data) => RequestEnvelope::Reply(route_callback(&data)),
    }
}

fn route_command(command: Command) -> RequestEnvelope {
    use RequestEnvelope::Reply;

    match command {
        Command::Start => Reply(StaticReply::Welcome),
        Command::Help => Reply(StaticReply::Help),
        Command::Analyze => Reply(StaticReply::Usage(Feature::Analyze)),
        Command::Stats => Reply(StaticReply::Stats),
        Command::Ask(q) => with_argument(q, RequestEnvelope::Ask, Feature::Ask),
        Command::Signal(d) => with_argument(d, RequestEnvelope::Signal, Feature::Signal),
        Command::Tips(q) => topic(Topic::Tips, q),
        Command::Equipment(q) => topic(Topic::Equipment, q),
        Command::Legal(q) => topic(Topic::Legal, q),
        Command::Safety(q) => topic(Topic::Safety, q),
    }
}

fn with_argument(
    arg: String,
    build: fn(String) -> RequestEnvelope,
    feature: Feature,
) -> RequestEnvelope {
    let arg = arg.trim();
    if arg.is_empty() {
        RequestEnvelope::Reply(StaticReply::Usage(feature))
    } else {
        build(arg.to_string())
    }
}

fn topic(topic: Topic, question: String) -> RequestEnvelope {
    let question = question.trim();
    if question.is_empty() {
        RequestEnvelope::Reply(StaticReply::Guide(topic))
    } else {
        RequestEnvelope::TopicQuestion {
            topic,
            question: question.to_string(),
        }
    }
}

fn route_callback(data: &str) -> StaticReply {
    match QuickAction::from_callback_data(data) {
        Some(QuickAction::HelpAnalyze) => StaticReply::ButtonHelp(Feature::Analyze),
        Some(QuickAction::HelpAsk) => StaticReply::ButtonHelp(Feature::Ask),
        Some(QuickAction::HelpSignal) => StaticReply::ButtonHelp(Feature::Signal),
        Some(QuickAction::Tips) => StaticReply::Guide(Topic::Tips),
        Some(QuickAction::Equipment) => StaticReply::Guide(Topic::Equipment),
        None => StaticReply::Fallback { command: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "treasure_hunter_bot";

    fn text(input: &str) -> RequestEnvelope {
        route(Event::from_text(input, BOT).expect("addressed to us"))
    }

    #[test]
    fn test_static_commands() {
        assert_eq!(text("/start"), RequestEnvelope::Reply(StaticReply::Welcome));
        assert_eq!(text("/help"), RequestEnvelope::Reply(StaticReply::Help));
        assert_eq!(
            text("/analyze"),
            RequestEnvelope::Reply(StaticReply::Usage(Feature::Analyze))
        );
        assert_eq!(text("/stats"), RequestEnvelope::Reply(StaticReply::Stats));
    }

    #[test]
    fn test_ask_and_signal_with_and_without_arguments() {
        assert_eq!(
            text("/ask   "),
            RequestEnvelope::Reply(StaticReply::Usage(Feature::Ask))
        );
        assert_eq!(
            text("/ask How deep do coins sink?"),
            RequestEnvelope::Ask("How deep do coins sink?".to_string())
        );
        assert_eq!(
            text("/signal"),
            RequestEnvelope::Reply(StaticReply::Usage(Feature::Signal))
        );
        assert_eq!(
            text("/signal@treasure_hunter_bot VDI 87, solid tone"),
            RequestEnvelope::Signal("VDI 87, solid tone".to_string())
        );
    }

    #[test]
    fn test_topic_commands() {
        assert_eq!(
            text("/legal"),
            RequestEnvelope::Reply(StaticReply::Guide(Topic::Legal))
        );
        assert_eq!(
            text("/equipment best coil for beaches"),
            RequestEnvelope::TopicQuestion {
                topic: Topic::Equipment,
                question: "best coil for beaches".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_and_foreign_commands() {
        assert_eq!(
            text("/dig now"),
            RequestEnvelope::Reply(StaticReply::Fallback {
                command: Some("/dig".to_string())
            })
        );
        assert_eq!(Event::from_text("/help@someone_else", BOT), None);
    }

    #[test]
    fn test_free_text_routing() {
        assert_eq!(
            text("where do I find old coins"),
            RequestEnvelope::Ask("where do I find old coins".to_string())
        );
        assert_eq!(
            text("Is this gold?"),
            RequestEnvelope::Ask("Is this gold?".to_string())
        );
        assert_eq!(text("nice weather"), RequestEnvelope::Reply(StaticReply::Greeting));
    }

    #[test]
    fn test_question_words_are_whole_words() {
        // "show" contains "how", "cannon" contains "can"
        assert!(!looks_like_question("show me the cannonball"));
        assert!(looks_like_question("HOW deep"));
        assert!(looks_like_question("help, my detector beeps"));
    }

    #[test]
    fn test_photo_routing() {
        assert_eq!(
            route(Event::Photo {
                file_id: "abc".to_string(),
                caption: Some("  ".to_string()),
            }),
            RequestEnvelope::Analyze {
                file_id: "abc".to_string(),
                caption: None,
            }
        );
    }

    #[test]
    fn test_callbacks() {
        for action in WELCOME_ACTIONS.iter().chain(FOLLOW_UP_ACTIONS) {
            assert_eq!(
                QuickAction::from_callback_data(action.callback_data()),
                Some(*action)
            );
        }
        assert_eq!(
            route(Event::Callback("help_signal".to_string())),
            RequestEnvelope::Reply(StaticReply::ButtonHelp(Feature::Signal))
        );
        assert_eq!(
            route(Event::Callback("equipment".to_string())),
            RequestEnvelope::Reply(StaticReply::Guide(Topic::Equipment))
        );
        assert_eq!(
            route(Event::Callback("bogus".to_string())),
            RequestEnvelope::Reply(StaticReply::Fallback { command: None })
        );
    }

    #[test]
    fn test_only_replies_skip_inference() {
        assert!(!RequestEnvelope::Reply(StaticReply::Help).needs_inference());
        assert!(RequestEnvelope::Ask("q".to_string()).needs_inference());
        assert!(RequestEnvelope::TopicQuestion {
            topic: Topic::Safety,
            question: "q".to_string()
        }
        .needs_inference());
    }
}
