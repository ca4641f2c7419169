//! Inline keyboards built from quick actions

use crate::router::QuickAction;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// One button per row, in the given order.
///
/// # Examples
///
/// ```
/// use treasure_hunter_bot::bot::views::quick_actions_keyboard;
/// use treasure_hunter_bot::router::WELCOME_ACTIONS;
///
/// let keyboard = quick_actions_keyboard(WELCOME_ACTIONS);
/// assert_eq!(keyboard.inline_keyboard.len(), 4);
/// ```
#[must_use]
pub fn quick_actions_keyboard(actions: &[QuickAction]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(actions.iter().map(|action| {
        vec![InlineKeyboardButton::callback(
            action.label(),
            action.callback_data(),
        )]
    }))
}
