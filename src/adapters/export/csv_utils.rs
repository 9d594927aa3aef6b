//! Contact CSV export and import. Uses the `csv` crate for quoting.

use crate::domain::inputs::CreateContactInput;
use crate::domain::{Contact, DomainError};
use serde::Deserialize;

const HEADER: [&str; 8] = [
    "id",
    "name",
    "phoneNumber",
    "email",
    "channel",
    "conversationsCount",
    "lastConversationAt",
    "createdAt",
];

/// Comma-delimited export with a header row.
pub fn contacts_to_csv(contacts: &[Contact]) -> Result<String, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());
    wtr.write_record(HEADER)?;

    for c in contacts {
        let count = c.conversations_count.to_string();
        let last = c
            .last_conversation_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let created = c.created_at.to_rfc3339();
        wtr.write_record([
            c.id.as_str(),
            c.name.as_deref().unwrap_or(""),
            c.phone_number.as_deref().unwrap_or(""),
            c.email.as_deref().unwrap_or(""),
            c.channel.as_str(),
            count.as_str(),
            last.as_str(),
            created.as_str(),
        ])?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;
    String::from_utf8(bytes).map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        ))
    })
}

#[derive(Deserialize)]
struct ImportRow {
    #[serde(alias = "phone", alias = "phone_number", rename = "phoneNumber")]
    phone_number: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Parse an import file with at least a `phoneNumber` (or `phone`) column.
/// Phone numbers are reduced to digits; empty cells become `None`.
pub fn parse_contacts_csv(data: &str) -> Result<Vec<CreateContactInput>, DomainError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<ImportRow>().enumerate() {
        let row = record
            .map_err(|e| DomainError::bad_request(format!("CSV line {}: {}", i + 2, e)))?;
        rows.push(CreateContactInput {
            phone_number: row.phone_number.chars().filter(char::is_ascii_digit).collect(),
            name: row.name.filter(|s| !s.is_empty()),
            email: row.email.filter(|s| !s.is_empty()),
            profile_picture_url: None,
            organization_id: None,
            metadata: None,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Channel;
    use chrono::Utc;

    #[test]
    fn export_quotes_fields() {
        let now = Utc::now();
        let contact = Contact {
            id: "c1".into(),
            tenant_id: "t".into(),
            channel: Channel::WhatsApp,
            external_id: "5511999999999".into(),
            phone_number: Some("5511999999999".into()),
            name: Some("Silva, Maria".into()),
            email: None,
            profile_picture_url: None,
            organization_id: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            conversations_count: 2,
            last_conversation_at: None,
        };
        let out = contacts_to_csv(&[contact]).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("c1,\"Silva, Maria\",5511999999999,,whatsapp,2,,"));
    }

    #[test]
    fn import_accepts_phone_alias_and_strips_formatting() {
        let rows = parse_contacts_csv("phone,name,email\n+55 (11) 99999-9999,Ana,\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].phone_number, "5511999999999");
        assert_eq!(rows[0].name.as_deref(), Some("Ana"));
        assert!(rows[0].email.is_none());
    }

    #[test]
    fn import_without_phone_column_fails() {
        assert!(parse_contacts_csv("name\nAna\n").is_err());
    }
}
