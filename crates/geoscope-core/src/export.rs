//! CSV form of stored summaries, for `geoscope export` and `geoscope import`.

use crate::model::PromptSummary;
use anyhow::Context;

pub const HEADER: [&str; 11] = [
    "client_name",
    "prompt_id",
    "prompt_text",
    "appearances",
    "appearance_percent",
    "avg_position",
    "avg_sentiment",
    "runs_requested",
    "runs_completed",
    "raw_responses",
    "timestamp",
];

/// Writes the header and one record per summary. Returns the record count.
pub fn write_summaries<W: std::io::Write>(
    writer: W,
    summaries: &[PromptSummary],
) -> anyhow::Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADER)?;
    for s in summaries {
        wtr.serialize(s).with_context(|| {
            format!(
                "failed to write summary client={} prompt_id={}",
                s.client_name, s.prompt_id
            )
        })?;
    }
    wtr.flush()?;
    Ok(summaries.len())
}

pub fn read_summaries<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<PromptSummary>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<PromptSummary>().enumerate() {
        let summary = row.with_context(|| format!("row {}: invalid summary", i + 1))?;
        summary
            .validate()
            .with_context(|| format!("row {}: inconsistent summary", i + 1))?;
        out.push(summary);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawResponses;
    use chrono::{TimeZone, Utc};

    fn summary(raw: RawResponses, avg_position: Option<f64>) -> PromptSummary {
        PromptSummary {
            client_name: "Acme Dental".into(),
            prompt_id: 3,
            prompt_text: "Affordable braces in Austin, TX?".into(),
            appearances: 1,
            appearance_percent: 50.0,
            avg_position,
            avg_sentiment: -0.25,
            runs_requested: 2,
            runs_completed: 2,
            raw_responses: raw,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn survives_quotes_newlines_and_separator() {
        let tricky = summary(
            RawResponses::join([
                "Try \"Acme Dental\", they're great.\nAlso: Smile Co.",
                "No clear pick ||| honestly",
            ]),
            Some(0.1),
        );
        let plain = PromptSummary {
            prompt_id: 4,
            ..summary(RawResponses::default(), None)
        };

        let mut buf = Vec::new();
        assert_eq!(write_summaries(&mut buf, &[tricky.clone(), plain.clone()]).unwrap(), 2);

        let back = read_summaries(buf.as_slice()).unwrap();
        assert_eq!(back, vec![tricky, plain]);
        assert_eq!(back[0].raw_responses.split().len(), 3);
    }

    #[test]
    fn empty_export_still_has_header() {
        let mut buf = Vec::new();
        write_summaries(&mut buf, &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("client_name,prompt_id,prompt_text"));
        assert!(read_summaries(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn absent_position_is_an_empty_field() {
        let mut buf = Vec::new();
        write_summaries(&mut buf, &[summary(RawResponses::default(), None)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let record = text.lines().nth(1).unwrap();
        assert!(record.contains(",50.0,,-0.25,"));
    }

    #[test]
    fn rejects_malformed_rows() {
        let csv = format!("{}\nAcme,not-a-number,x,0,0,,0,1,0,,2025-01-01T00:00:00Z\n", HEADER.join(","));
        let err = read_summaries(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn rejects_rows_that_break_summary_relations() {
        let good = "Acme Dental,1,q,1,100.0,0.5,0.0,1,1,x,2025-01-01T00:00:00Z";
        let bad = "Acme Dental,2,q,5,500.0,1.7,-9.0,1,1,x,2025-01-01T00:00:00Z";
        let csv = format!("{}\n{}\n{}\n", HEADER.join(","), good, bad);
        let err = read_summaries(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2: inconsistent summary"));

        let csv = format!("{}\n{}\n", HEADER.join(","), good);
        assert_eq!(read_summaries(csv.as_bytes()).unwrap().len(), 1);
    }
}
