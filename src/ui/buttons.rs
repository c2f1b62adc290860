use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

/// Custom id prefix for search pick buttons; the suffix is the 1-based
/// result number.
pub const PICK_PREFIX: &str = "pick_";

/// One numbered button per candidate, five per row (the Discord row limit).
pub fn pick_buttons(count: usize) -> Vec<CreateActionRow> {
    let buttons: Vec<CreateButton> = (1..=count)
        .map(|i| {
            CreateButton::new(format!("{PICK_PREFIX}{i}"))
                .label(i.to_string())
                .style(ButtonStyle::Primary)
        })
        .collect();

    buttons
        .chunks(5)
        .map(|chunk| CreateActionRow::Buttons(chunk.to_vec()))
        .collect()
}

/// Recovers the picked number from a component custom id.
pub fn parse_pick_id(custom_id: &str) -> Option<usize> {
    custom_id.strip_prefix(PICK_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn five_results_fit_one_row() {
        assert_eq!(pick_buttons(5).len(), 1);
    }

    #[test]
    fn six_results_need_two_rows() {
        assert_eq!(pick_buttons(6).len(), 2);
    }

    #[test]
    fn pick_ids_round_trip() {
        assert_eq!(parse_pick_id("pick_3"), Some(3));
        assert_eq!(parse_pick_id("pick_12"), Some(12));
    }

    #[test]
    fn foreign_ids_are_ignored() {
        assert_eq!(parse_pick_id("music_skip"), None);
        assert_eq!(parse_pick_id("pick_"), None);
        assert_eq!(parse_pick_id("pick_abc"), None);
    }
}
