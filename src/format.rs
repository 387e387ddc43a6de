//! Output formatting for contacts, groups, send results and live events.

use crate::jid::Jid;
use crate::protocol::{Contact, Event, Group, ReceiptKind, SendReceipt};
use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::fmt::Write;

/// Name shown for a contact: push name, then business name.
pub fn display_name(contact: &Contact) -> &str {
    [&contact.push_name, &contact.business_name]
        .into_iter()
        .flatten()
        .map(|name| name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or("Unknown")
}

/// Sort contacts by display name (case-insensitive), then address.
fn sorted(contacts: &[Contact]) -> Vec<&Contact> {
    let mut sorted: Vec<&Contact> = contacts.iter().collect();
    sorted.sort_by(|a, b| {
        display_name(a)
            .to_lowercase()
            .cmp(&display_name(b).to_lowercase())
            .then_with(|| a.jid.to_string().cmp(&b.jid.to_string()))
    });
    sorted
}

/// Format the contact list. `limit: None` lists everything.
pub fn contacts(contacts: &[Contact], limit: Option<usize>) -> String {
    if contacts.is_empty() {
        return "No contacts found.\n".to_string();
    }

    let mut out = String::new();
    match limit {
        None => {
            let _ = writeln!(out, "All {} contacts:\n", contacts.len());
        }
        Some(_) => {
            let _ = writeln!(out, "{} contacts found:\n", contacts.len());
        }
    }

    let shown = limit.unwrap_or(contacts.len()).min(contacts.len());
    for contact in sorted(contacts).into_iter().take(shown) {
        let _ = writeln!(out, "  {} ({})", display_name(contact), contact.jid.user);
    }

    if shown < contacts.len() {
        let _ = writeln!(out, "... and {} more contacts", contacts.len() - shown);
        let _ = writeln!(out, "Use 'list all' to show every contact.");
    }
    out
}

/// Format the list of joined groups.
pub fn groups(groups: &[Group]) -> String {
    if groups.is_empty() {
        return "No groups found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} groups:\n", groups.len());
    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, group.name);
        let _ = writeln!(out, "   ID: {}", group.jid);
        if !group.topic.trim().is_empty() {
            let _ = writeln!(out, "   Description: {}", group.topic.trim());
        }
        let _ = writeln!(out, "   Participants: {}\n", group.participants.len());
    }
    out
}

/// Confirmation line after a successful send.
pub fn sent(to: &Jid, text: &str) -> String {
    if to.is_group() {
        format!("Group message sent: {}", text)
    } else {
        format!("Message sent to {}: {}", to.user, text)
    }
}

/// Line printed for a live event, if it is worth showing.
pub fn event(event: &Event) -> Option<String> {
    match event {
        Event::Message { sender, text } if !text.is_empty() => {
            Some(format!("Message from {}: {}", sender, text))
        }
        Event::Receipt {
            kind: ReceiptKind::Read | ReceiptKind::ReadSelf,
            source,
        } => Some(format!("Read by {}", source)),
        _ => None,
    }
}

#[derive(Serialize)]
struct JsonContact<'a> {
    jid: String,
    user: &'a str,
    name: &'a str,
}

/// Machine-readable contact list (sorted like the text view).
pub fn contacts_json(contacts: &[Contact], limit: Option<usize>) -> Result<String> {
    let shown = limit.unwrap_or(contacts.len());
    let list: Vec<JsonContact> = sorted(contacts)
        .into_iter()
        .take(shown)
        .map(|c| JsonContact {
            jid: c.jid.to_string(),
            user: &c.jid.user,
            name: display_name(c),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&json!({
        "total": contacts.len(),
        "contacts": list,
    }))?)
}

/// Machine-readable group list.
pub fn groups_json(groups: &[Group]) -> Result<String> {
    Ok(serde_json::to_string_pretty(groups)?)
}

/// Machine-readable send result.
pub fn sent_json(to: &Jid, text: &str, receipt: &SendReceipt) -> Result<String> {
    Ok(serde_json::to_string_pretty(&json!({
        "success": true,
        "to": to.to_string(),
        "id": receipt.id,
        "timestamp": receipt.timestamp,
        "text": text,
    }))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::contact;

    fn group(name: &str, topic: &str, members: usize) -> Group {
        Group {
            jid: Jid::parse("120363012345678901-1600000000@g.us").unwrap(),
            name: name.to_string(),
            topic: topic.to_string(),
            participants: (0..members)
                .map(|i| Jid::parse(&format!("49{}@s.whatsapp.net", i)).unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name(&contact("1", Some("Anna"), Some("Shop"))), "Anna");
        assert_eq!(display_name(&contact("1", Some(""), Some("Shop"))), "Shop");
        assert_eq!(display_name(&contact("1", None, None)), "Unknown");
        assert_eq!(display_name(&contact("1", Some("  "), None)), "Unknown");
    }

    #[test]
    fn test_contacts_limited() {
        let list: Vec<Contact> = (0..25)
            .map(|i| contact(&format!("49{:02}", i), Some(&format!("Person {:02}", i)), None))
            .collect();
        let out = contacts(&list, Some(20));
        assert!(out.starts_with("25 contacts found:"));
        assert!(out.contains("  Person 00 (4900)"));
        assert!(out.contains("  Person 19 (4919)"));
        assert!(!out.contains("Person 20"));
        assert!(out.contains("... and 5 more contacts"));
        assert!(out.contains("list all"));
    }

    #[test]
    fn test_contacts_all_sorted() {
        let list = vec![
            contact("2", Some("bob"), None),
            contact("1", Some("Alice"), None),
            contact("3", None, None),
        ];
        let out = contacts(&list, None);
        assert!(out.starts_with("All 3 contacts:"));
        let alice = out.find("Alice").unwrap();
        let bob = out.find("bob").unwrap();
        let unknown = out.find("Unknown").unwrap();
        assert!(alice < bob && bob < unknown);
        assert!(!out.contains("more contacts"));
    }

    #[test]
    fn test_contacts_empty() {
        assert_eq!(contacts(&[], Some(20)), "No contacts found.\n");
    }

    #[test]
    fn test_groups() {
        let out = groups(&[group("Climbing", "Tuesdays at 7", 3), group("Family", "", 2)]);
        assert!(out.starts_with("Found 2 groups:"));
        assert!(out.contains("1. Climbing\n   ID: 120363012345678901-1600000000@g.us\n"));
        assert!(out.contains("   Description: Tuesdays at 7\n"));
        assert!(out.contains("   Participants: 3\n"));
        assert_eq!(out.matches("Description:").count(), 1);
        assert_eq!(groups(&[]), "No groups found.\n");
    }

    #[test]
    fn test_sent() {
        let user = Jid::parse("4911@s.whatsapp.net").unwrap();
        assert_eq!(sent(&user, "hi"), "Message sent to 4911: hi");
        let grp = Jid::parse("1203-99@g.us").unwrap();
        assert_eq!(sent(&grp, "hi all"), "Group message sent: hi all");
    }

    #[test]
    fn test_event_lines() {
        let msg = Event::Message {
            sender: "4911@s.whatsapp.net".to_string(),
            text: "hey".to_string(),
        };
        assert_eq!(event(&msg).unwrap(), "Message from 4911@s.whatsapp.net: hey");

        let media = Event::Message {
            sender: "4911@s.whatsapp.net".to_string(),
            text: String::new(),
        };
        assert!(event(&media).is_none());

        let read = Event::Receipt {
            kind: ReceiptKind::ReadSelf,
            source: "4911".to_string(),
        };
        assert_eq!(event(&read).unwrap(), "Read by 4911");

        let delivered = Event::Receipt {
            kind: ReceiptKind::Delivered,
            source: "4911".to_string(),
        };
        assert!(event(&delivered).is_none());
    }

    #[test]
    fn test_json_output() {
        let list = vec![contact("2", Some("Bob"), None), contact("1", None, Some("Bakery"))];
        let value: serde_json::Value =
            serde_json::from_str(&contacts_json(&list, Some(1)).unwrap()).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["contacts"][0]["name"], "Bakery");
        assert_eq!(value["contacts"].as_array().unwrap().len(), 1);

        let to = Jid::parse("4911@s.whatsapp.net").unwrap();
        let receipt = SendReceipt {
            id: "X1".to_string(),
            timestamp: 5,
        };
        let value: serde_json::Value =
            serde_json::from_str(&sent_json(&to, "hi", &receipt).unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["to"], "4911@s.whatsapp.net");
    }
}
