//! Sequential invoice numbering per team.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use db::models::invoice::Invoice;

const DEFAULT_WIDTH: usize = 4;

/// Splits `INV-0042` into (`INV-`, `0042`). The digit run must be trailing.
fn split_trailing_digits(number: &str) -> (&str, &str) {
    let digits_start = number
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(number.len());
    number.split_at(digits_start)
}

/// Number following `latest`, keeping its zero padding. Falls back to
/// `{prefix}0001` when there is nothing to increment.
pub fn next_invoice_number(latest: Option<&str>, prefix: &str) -> String {
    let Some(latest) = latest else {
        return format!("{prefix}{:0width$}", 1, width = DEFAULT_WIDTH);
    };
    let (head, digits) = split_trailing_digits(latest);
    match digits.parse::<u64>() {
        Ok(value) => format!("{head}{:0width$}", value + 1, width = digits.len()),
        Err(_) => format!("{prefix}{:0width$}", 1, width = DEFAULT_WIDTH),
    }
}

/// Picks the number with the largest numeric suffix, so `INV-100` beats
/// `INV-99` even though it sorts lower as text.
pub fn highest_number<'a, I>(numbers: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    numbers
        .into_iter()
        .filter_map(|number| {
            let (_, digits) = split_trailing_digits(number);
            digits.parse::<u64>().ok().map(|value| (value, number))
        })
        .max_by_key(|(value, _)| *value)
        .map(|(_, number)| number)
}

/// Next free invoice number for the team, based on what is stored.
pub async fn next_for_team<'e, E>(executor: E, team_id: Uuid, prefix: &str) -> Result<String, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let numbers = Invoice::numbers_with_prefix(executor, team_id, prefix).await?;
    let latest = highest_number(numbers.iter().map(String::as_str));
    Ok(next_invoice_number(latest, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_with_prefix() {
        assert_eq!(next_invoice_number(None, "INV-"), "INV-0001");
        assert_eq!(next_invoice_number(None, ""), "0001");
    }

    #[test]
    fn increments_and_keeps_padding() {
        assert_eq!(next_invoice_number(Some("INV-0009"), "INV-"), "INV-0010");
        assert_eq!(next_invoice_number(Some("INV-9999"), "INV-"), "INV-10000");
        assert_eq!(next_invoice_number(Some("2025/007"), "INV-"), "2025/008");
    }

    #[test]
    fn restarts_when_latest_has_no_digits() {
        assert_eq!(next_invoice_number(Some("DRAFT"), "INV-"), "INV-0001");
    }

    #[test]
    fn highest_compares_numerically() {
        let numbers = ["INV-99", "INV-100", "INV-0042", "INV-DRAFT"];
        assert_eq!(highest_number(numbers), Some("INV-100"));
        assert_eq!(highest_number(Vec::<&str>::new()), None);
    }
}
