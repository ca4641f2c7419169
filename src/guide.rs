//! Static treasure-hunting knowledge base and canned replies.
//!
//! Texts are written in the same light Markdown the model produces, so they
//! go through the same HTML rendering as inference answers.

use crate::router::{Command, Feature, StaticReply, Topic};
use std::time::Duration;
use teloxide::utils::command::BotCommands;

const WELCOME: &str = "🏴‍☠️ **Welcome to Treasure Hunter Bot!** 🏴‍☠️

I'm your AI-powered treasure hunting assistant, ready to help you with:

🔍 **Image Analysis** - Upload photos of finds, signals, or sites
❓ **Expert Q&A** - Ask any treasure hunting questions
📊 **Signal Analysis** - Describe metal detecting signals for interpretation
💡 **Tips & Guidance** - Get expert advice and recommendations

**Quick Start:**
- Send me a photo to analyze (see /analyze)
- Ask questions with /ask [your question]
- Describe signals with /signal [description]
- Use /help for all commands

Happy hunting! 🎯";

const PRO_TIPS: &str = "💡 **Pro Tips:**
- Upload clear, well-lit photos for best analysis
- Include specific questions as the photo caption
- Add a question to a guide command, e.g. /legal can I detect on beaches
- Always follow local laws and get permissions
- Practice safe and ethical treasure hunting";

const TIPS: &str = "🎯 **General Treasure Hunting Tips:**

**🔍 Research First:**
- Study historical maps and records
- Research local history and settlements
- Check for old foundations, roads, and structures

**⚡ Metal Detecting Best Practices:**
- Start with trashy areas to learn your detector
- Swing slowly and steadily, coil close and parallel to the ground
- Dig all targets while learning
- Fill in all holes and respect property

**🗺️ Site Selection:**
- Old homesteads and farmhouses
- Historic picnic areas and fairgrounds
- Beaches after storms
- Parks and recreational areas (with permission)

**📜 Legal & Ethical:**
- Always get permission before detecting
- Report significant historical finds
- Leave sites better than you found them

Remember: the best treasure hunters are patient, persistent, and always learning! 🏆";

const EQUIPMENT: &str = "🛠️ **Equipment Recommendations by Experience Level:**

**🔰 Beginner Detectors:**
- Garrett ACE 300 - great starter with target ID
- Fisher F22 - weather resistant with good discrimination
- Nokta Simplex+ - excellent features for the price

**⚡ Intermediate Detectors:**
- Garrett AT Pro - all-terrain versatility
- XP ORX - wireless and customizable
- Minelab Vanquish 540 - multi-frequency technology

**🏆 Advanced Detectors:**
- Minelab Equinox 800 - multi-frequency excellence
- XP Deus - wireless and highly customizable
- Garrett ATX - extreme depth for serious hunters

**🔧 Essential Accessories:**
- **Digging tools:** Lesche digger, pinpointer
- **Headphones:** wired or detector-specific wireless
- **Finds storage:** belt pouch with compartments
- **Comfort:** knee pads, armrest

**💰 Budget Tips:**
- Buy quality used equipment
- Upgrade gradually as you learn
- Always carry spare batteries

Remember: the best detector is the one you learn to use properly! 🎯";

const LEGAL: &str = "📜 **Legal & Ethical Treasure Hunting Guidelines:**

**🏛️ Legal Requirements:**
- **Private property:** always get written permission
- **Public lands:** check local regulations and permits
- **Federal lands:** generally prohibited without permits
- **Archaeological sites:** strictly protected, stay away

**📋 Permission Best Practices:**
- Approach landowners respectfully
- Offer to share interesting finds
- Always honor their conditions and restrictions

**🏛️ Historical Preservation:**
- Report significant archaeological finds
- Photograph finds in context before removal
- Document your discoveries

**⚖️ Location Notes:**
- **Beaches:** check local ordinances
- **Cemeteries:** off-limits everywhere
- **Military bases:** absolutely prohibited

**🚫 Never:**
- Hunt private land without permission
- Ignore \"No Trespassing\" signs
- Damage property while digging

Remember: ethical hunters preserve the hobby for future generations! 🏆";

const SAFETY: &str = "🛡️ **Treasure Hunting Safety Guidelines:**

**⚠️ Personal Safety:**
- Never hunt alone in remote areas
- Tell someone your plans and location
- Carry a charged phone, water and first aid supplies

**🌡️ Weather Awareness:**
- Check the forecast before heading out
- Avoid hunting during storms
- Protect yourself from sun and cold

**🏞️ Environmental Hazards:**
- Watch for unstable ground and erosion
- Stay away from cliffs, old wells and ruins
- Check for poison ivy and other harmful plants

**💣 Dangerous Finds:**
- Never touch suspected ordnance; mark the spot and call the authorities
- Beware of sharp metal and broken glass

**🚨 Emergency Procedures:**
- Know local emergency numbers
- Keep GPS coordinates of your location
- Know where the nearest hospital is

Remember: no find is worth your safety or well-being! 🛡️";

const USAGE_ANALYZE: &str = "📸 **Image Analysis Instructions:**

To analyze an image for treasure hunting signals:

1. **Upload a clear photo** of your find, signal, or site
2. **Add a caption** with any specific questions or context
3. **Wait for AI analysis** - this may take a few moments

**Best Results Tips:**
- Use good lighting and clear focus
- Include a size reference (coin, ruler, etc.)
- Mention specific areas of interest

Upload your image now! 🔍";

const USAGE_ASK: &str = "❓ **Ask a Treasure Hunting Question:**

Usage: `/ask [your question]`

Examples:
- `/ask What's the best detector for beginners?`
- `/ask How deep can modern detectors find coins?`
- `/ask What are the best beaches for metal detecting?`";

const USAGE_SIGNAL: &str = "📊 **Signal Analysis Instructions:**

Usage: `/signal [description of your signal]`

Examples:
- `/signal Strong consistent tone at 6 inches, VDI shows 87`
- `/signal Choppy signal, jumps between iron and coin range`

Include details like:
- Signal strength and consistency
- Depth indication
- VDI/TID numbers
- Ground conditions
- Detector model and settings";

const BUTTON_ANALYZE: &str = "📸 **Image Analysis Help:**

Upload any photo related to treasure hunting:
- Metal detecting finds
- Signals on your detector screen
- Potential hunting sites
- Artifacts or relics

I'll provide expert analysis and identification help!";

const BUTTON_ASK: &str = "❓ **Ask Questions Help:**

Ask me anything about treasure hunting:
- Equipment recommendations
- Hunting techniques and tips
- Site research and selection
- Find identification
- Legal and safety guidelines

Just type your question or use `/ask [question]`";

const BUTTON_SIGNAL: &str = "📊 **Signal Analysis Help:**

Describe your metal detecting signals:
- Signal strength and consistency
- Depth readings
- VDI/TID numbers
- Detector model and settings

Use `/signal [description]` for detailed analysis!";

const GREETING: &str = "👋 Hi there! I'm here to help with treasure hunting questions and image analysis.

Try:
- Upload a photo for analysis 📸
- Ask a question about treasure hunting ❓
- Use /help for all available commands 💡";

/// Sent after an image analysis, together with the follow-up keyboard
pub const FOLLOW_UP_PROMPT: &str = "Need more help? Choose an option below:";

/// Runtime counters shown by `/stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageStats {
    /// Users with a live rate-limit window
    pub tracked_users: u64,
    /// Requests answered by the model since start
    pub answered: u64,
    /// Requests refused by the rate limiter since start
    pub throttled: u64,
    /// Requests allowed per window
    pub limit: usize,
    /// Window length
    pub window: Duration,
    /// Time since start
    pub uptime: Duration,
}

/// Markdown text for a canned reply.
#[must_use]
pub fn text(reply: &StaticReply, stats: &UsageStats) -> String {
    match reply {
        StaticReply::Welcome => WELCOME.to_string(),
        StaticReply::Help => help(),
        StaticReply::Usage(feature) => usage(*feature).to_string(),
        StaticReply::ButtonHelp(feature) => button_help(*feature).to_string(),
        StaticReply::Guide(topic) => guide(*topic).to_string(),
        StaticReply::Greeting => GREETING.to_string(),
        StaticReply::Fallback { command } => fallback(command.as_deref()),
        StaticReply::Stats => stats_text(stats),
    }
}

/// Command list generated from the command enum, followed by usage tips.
#[must_use]
pub fn help() -> String {
    format!("🎯 {}\n\n{PRO_TIPS}", Command::descriptions())
}

/// Knowledge-base section for a topic
#[must_use]
pub const fn guide(topic: Topic) -> &'static str {
    match topic {
        Topic::Tips => TIPS,
        Topic::Equipment => EQUIPMENT,
        Topic::Legal => LEGAL,
        Topic::Safety => SAFETY,
    }
}

const fn usage(feature: Feature) -> &'static str {
    match feature {
        Feature::Analyze => USAGE_ANALYZE,
        Feature::Ask => USAGE_ASK,
        Feature::Signal => USAGE_SIGNAL,
    }
}

const fn button_help(feature: Feature) -> &'static str {
    match feature {
        Feature::Analyze => BUTTON_ANALYZE,
        Feature::Ask => BUTTON_ASK,
        Feature::Signal => BUTTON_SIGNAL,
    }
}

fn fallback(command: Option<&str>) -> String {
    let lead = match command {
        Some(command) => format!("🤔 I don't know the command `{command}`."),
        None => "🤔 That option is no longer available.".to_string(),
    };
    format!("{lead}\n\n{}", help())
}

fn stats_text(stats: &UsageStats) -> String {
    format!(
        "📊 **Bot Statistics**\n\n\
         - Active users: {}\n\
         - Answers given: {}\n\
         - Requests throttled: {}\n\
         - Rate limit: {} requests per {}s\n\
         - Uptime: {}",
        stats.tracked_users,
        stats.answered,
        stats.throttled,
        stats.limit,
        stats.window.as_secs(),
        format_uptime(stats.uptime),
    )
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, minutes) = (secs / 86_400, secs % 86_400 / 3600, secs % 3600 / 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {}s", secs % 60)
    }
}

/// Quota notice with the wait time.
#[must_use]
pub fn throttled(retry_after_secs: u64) -> String {
    format!("⏰ Please wait {retry_after_secs} seconds before sending another request.")
}

/// Hint sent when an upload cannot be decoded or is too large.
#[must_use]
pub fn unsupported_image(max_size_mb: usize) -> String {
    format!(
        "❌ Sorry, I couldn't process this image. Please make sure it's under \
         {max_size_mb}MB and in a supported format (JPG, PNG, GIF, BMP or WEBP)."
    )
}

/// Apology sent when the model or Telegram fails.
#[must_use]
pub const fn apology(analyzing_image: bool) -> &'static str {
    if analyzing_image {
        "❌ Sorry, I couldn't analyze your image right now. Please try again in a moment."
    } else {
        "❌ Sorry, I couldn't get an answer right now. Please try again in a moment."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> UsageStats {
        UsageStats {
            tracked_users: 3,
            answered: 42,
            throttled: 1,
            limit: 10,
            window: Duration::from_secs(60),
            uptime: Duration::from_secs(3 * 3600 + 125),
        }
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help();
        for cmd in [
            "/start", "/help", "/analyze", "/ask", "/signal", "/tips", "/equipment", "/legal",
            "/safety", "/stats",
        ] {
            assert!(help.contains(cmd), "missing {cmd}");
        }
        assert!(help.contains("Pro Tips"));
    }

    #[test]
    fn test_fallback_mentions_command_and_help() {
        let reply = StaticReply::Fallback {
            command: Some("/dig".to_string()),
        };
        let text = text(&reply, &stats());
        assert!(text.contains("`/dig`"));
        assert!(text.contains("/help"));
    }

    #[test]
    fn test_stats_text() {
        let text = text(&StaticReply::Stats, &stats());
        assert!(text.contains("Answers given: 42"));
        assert!(text.contains("10 requests per 60s"));
        assert!(text.contains("Uptime: 3h 2m"));
    }

    #[test]
    fn test_guides_fit_in_one_message() {
        for topic in [Topic::Tips, Topic::Equipment, Topic::Legal, Topic::Safety] {
            assert!(guide(topic).chars().count() < crate::config::TELEGRAM_MESSAGE_LIMIT);
        }
    }

    #[test]
    fn test_notices() {
        assert!(throttled(17).contains("17 seconds"));
        assert!(unsupported_image(10).contains("10MB"));
        assert_ne!(apology(true), apology(false));
    }
}
