//! Property/Value table output.

use crate::schedule::ScheduleSpec;

/// Render rows as a bordered two-column table.
pub fn render_table(rows: &[(&str, String)]) -> String {
    let key_width = rows
        .iter()
        .map(|(key, _)| key.chars().count())
        .chain(std::iter::once("Property".len()))
        .max()
        .unwrap_or(0);
    let value_width = rows
        .iter()
        .map(|(_, value)| value.chars().count())
        .chain(std::iter::once("Value".len()))
        .max()
        .unwrap_or(0);

    let border = format!("+{}+{}+", "-".repeat(key_width + 2), "-".repeat(value_width + 2));
    let line = |key: &str, value: &str| {
        format!("| {:<kw$} | {:<vw$} |", key, value, kw = key_width, vw = value_width)
    };

    let mut out = Vec::with_capacity(rows.len() + 4);
    out.push(border.clone());
    out.push(line("Property", "Value"));
    out.push(border.clone());
    for (key, value) in rows {
        out.push(line(key, value.as_str()));
    }
    out.push(border);
    out.join("\n")
}

pub fn render_schedule(spec: &ScheduleSpec) -> String {
    render_table(&spec.fields())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DailyChoice, WeeklyChoice};

    #[test]
    fn test_render_schedule() {
        let spec = ScheduleSpec {
            enabled: true,
            weekly: WeeklyChoice::Sunday,
            daily: DailyChoice::Hours0200To0400,
            rotation: 2,
        };

        let expected = "\
+----------+-------------+
| Property | Value       |
+----------+-------------+
| daily    | H_0200_0400 |
| enabled  | true        |
| rotation | 2           |
| weekly   | SUNDAY      |
+----------+-------------+";
        assert_eq!(render_schedule(&spec), expected);
    }

    #[test]
    fn test_render_empty_table() {
        let expected = "\
+----------+-------+
| Property | Value |
+----------+-------+
+----------+-------+";
        assert_eq!(render_table(&[]), expected);
    }
}
