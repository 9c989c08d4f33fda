//! Prompt templates sent to the image backend

use super::Style;

/// Prompt for generating a brand-new room
pub fn generate_prompt(style: Style) -> String {
    format!(
        "A high-resolution, photorealistic image of a {} style room.",
        style
    )
}

/// Prompt for restyling a captured photo
pub fn redesign_prompt(style: Style) -> String {
    format!(
        "Redesign this room in a {} style. Keep the original room structure and furniture \
         layout but change the wall colors, furniture style, decorations, and lighting to \
         match the new style.",
        style
    )
}
