//! CSV rendering for question tables.

use crate::model::{QuestionTable, COLUMNS};

/// Convert a question table to CSV with a header row.
///
/// Fields containing a comma, quote or line break are quoted, with inner
/// quotes doubled. Absent answers and figures are empty fields.
pub fn to_csv(table: &QuestionTable) -> String {
    let mut out = String::new();
    push_row(&mut out, COLUMNS.iter().copied());

    for record in table {
        let number = record.number.to_string();
        let answer = record.answer.map(|l| l.to_string()).unwrap_or_default();
        let figure = record.figure.as_deref().unwrap_or("");
        push_row(
            &mut out,
            [
                number.as_str(),
                record.question.as_str(),
                record.a.as_str(),
                record.b.as_str(),
                record.c.as_str(),
                record.d.as_str(),
                answer.as_str(),
                figure,
            ],
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Letter, QuestionBlock, QuestionRecord};

    #[test]
    fn test_to_csv() {
        let mut first = QuestionRecord::from_block(QuestionBlock {
            number: 1,
            stem: "Which, if any?".to_string(),
            options: [
                "say \"hi\"".to_string(),
                "b".to_string(),
                String::new(),
                "d".to_string(),
            ],
        });
        first.answer = Some(Letter::B);
        first.figure = Some("figures/q_1_figure.png".to_string());

        let csv = to_csv(&QuestionTable::new(vec![first], 1));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "number,Question,A,B,C,D,answer,Figure");
        assert_eq!(
            lines[1],
            "1,\"Which, if any?\",\"say \"\"hi\"\"\",b,,d,B,figures/q_1_figure.png"
        );
    }

    #[test]
    fn test_to_csv_empty_table() {
        assert_eq!(
            to_csv(&QuestionTable::default()),
            "number,Question,A,B,C,D,answer,Figure\n"
        );
    }
}
