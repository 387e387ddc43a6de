//! Line-oriented interactive shell.

use crate::format;
use crate::gateway::{EventStream, Messenger};
use crate::jid::{normalize_recipient, Jid, RecipientKind};
use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

const PROMPT: &str = "whatsapp> ";

const BANNER: &str = "\
Available commands:
  send <number> <message>   - send a message
  list                      - list contacts
  quit                      - exit

Example: send 491234567890 Hello from the console!
One-shot: whatsapp-console send 491234567890 'Hello world!'
";

const HELP: &str = "\
Available commands:
  send <number/group> <message>  - send a message
     person: send 491234567890 Hello
     group:  send 120363XXXXXXXXXX-XXXXXXXXXX@g.us Hello group
  list                           - show the first contacts
  list all                       - show all contacts
  list groups                    - show joined groups
  status                         - show gateway and session state
  quit                           - exit
  help                           - show this help
";

const SEND_USAGE: &str = "\
Usage: send <number/group-id> <message>
  person: send 491234567890 Hello world!
  group:  send 120363XXXXXXXXXX-XXXXXXXXXX@g.us Hello group!
";

/// What `list` should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// The first `contact_limit` contacts.
    Top,
    All,
    Groups,
}

impl ListScope {
    /// Interpret the optional word after `list`.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::to_lowercase).as_deref() {
            Some("all") => ListScope::All,
            Some("groups") => ListScope::Groups,
            _ => ListScope::Top,
        }
    }
}

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Quit,
    Send { recipient: String, text: String },
    /// `send` without enough arguments.
    SendUsage,
    List(ListScope),
    Status,
    Help,
    Unknown(String),
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Split off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(i) => (&input[..i], input[i..].trim_start()),
        None => (input, ""),
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = split_word(line);
    let command = match word.to_lowercase().as_str() {
        "quit" | "exit" | "q" => ShellCommand::Quit,
        "send" | "s" => {
            let (recipient, text) = split_word(rest);
            if recipient.is_empty() || text.is_empty() {
                ShellCommand::SendUsage
            } else {
                ShellCommand::Send {
                    recipient: recipient.to_string(),
                    text: text.to_string(),
                }
            }
        }
        "list" | "l" => {
            let (arg, _) = split_word(rest);
            ShellCommand::List(ListScope::from_arg(Some(arg).filter(|a| !a.is_empty())))
        }
        "status" => ShellCommand::Status,
        "help" | "h" => ShellCommand::Help,
        _ => ShellCommand::Unknown(word.to_string()),
    };
    Some(command)
}

/// The interactive shell, bound to a messenger and an output sink.
pub struct Shell<'a, M: ?Sized, W> {
    messenger: &'a M,
    out: W,
    contact_limit: usize,
    prompt: bool,
}

impl<'a, M, W> Shell<'a, M, W>
where
    M: Messenger + ?Sized,
    W: Write + Send,
{
    pub fn new(messenger: &'a M, out: W, contact_limit: usize) -> Self {
        Self {
            messenger,
            out,
            contact_limit,
            prompt: false,
        }
    }

    /// Print a prompt before each line (only useful on a terminal).
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Read and execute lines until `quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        writeln!(self.out, "\n{}", BANNER)?;
        let mut lines = input.lines();

        loop {
            if self.prompt {
                write!(self.out, "{}", PROMPT)?;
                self.out.flush()?;
            }

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                debug!("end of input");
                break;
            };
            let Some(command) = parse_line(&line) else {
                continue;
            };

            match self.execute(command).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(self.out, "Error: {:#}", e)?,
            }
            self.out.flush()?;
        }
        Ok(())
    }

    /// Execute a single command.
    pub async fn execute(&mut self, command: ShellCommand) -> Result<Flow> {
        match command {
            ShellCommand::Quit => {
                writeln!(self.out, "Goodbye!")?;
                return Ok(Flow::Quit);
            }
            ShellCommand::Send { recipient, text } => self.send(&recipient, &text).await?,
            ShellCommand::SendUsage => write!(self.out, "{}", SEND_USAGE)?,
            ShellCommand::List(scope) => self.list(scope).await?,
            ShellCommand::Status => self.status().await?,
            ShellCommand::Help => write!(self.out, "\n{}", HELP)?,
            ShellCommand::Unknown(word) => {
                writeln!(self.out, "Unknown command: {} (type 'help' for help)", word)?
            }
        }
        Ok(Flow::Continue)
    }

    async fn send(&mut self, recipient: &str, text: &str) -> Result<()> {
        let recipient = normalize_recipient(recipient);
        match recipient.kind {
            RecipientKind::Group => writeln!(self.out, "Sending to group: {}", recipient.address)?,
            RecipientKind::Phone => {
                writeln!(self.out, "Sending to contact: {}", recipient.address)?
            }
            RecipientKind::Explicit => {}
        }

        let jid = Jid::parse(&recipient.address)
            .map_err(|e| anyhow!("Invalid number or group ID: {}", e))?;
        self.messenger
            .send_text(&jid, text)
            .await
            .context("Failed to send message")?;
        writeln!(self.out, "{}", format::sent(&jid, text))?;
        Ok(())
    }

    async fn list(&mut self, scope: ListScope) -> Result<()> {
        match scope {
            ListScope::Groups => {
                writeln!(self.out, "Loading groups...")?;
                let groups = self
                    .messenger
                    .joined_groups()
                    .await
                    .context("Failed to load groups")?;
                write!(self.out, "{}", format::groups(&groups))?;
            }
            ListScope::Top | ListScope::All => {
                writeln!(self.out, "Loading contacts...")?;
                let contacts = self
                    .messenger
                    .contacts()
                    .await
                    .context("Failed to load contacts")?;
                let limit = (scope == ListScope::Top).then_some(self.contact_limit);
                writeln!(self.out, "{}", format::contacts(&contacts, limit))?;
            }
        }
        Ok(())
    }

    async fn status(&mut self) -> Result<()> {
        let status = self
            .messenger
            .status()
            .await
            .context("Failed to query session status")?;
        let yes_no = |b: bool| if b { "yes" } else { "no" };

        writeln!(
            self.out,
            "Gateway: {} ({})",
            self.messenger.name(),
            self.messenger.endpoint()
        )?;
        writeln!(self.out, "Logged in: {}", yes_no(status.logged_in))?;
        writeln!(self.out, "Connected: {}", yes_no(status.connected))?;
        if let Some(jid) = status.jid {
            writeln!(self.out, "Account: {}", jid)?;
        }
        Ok(())
    }
}

/// Print live events until the feed ends. Items that fail to decode are
/// logged and skipped.
pub async fn print_events<W: Write>(mut events: EventStream, out: &mut W) -> Result<()> {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let Some(line) = format::event(&event) {
                    writeln!(out, "\n{}", line)?;
                    out.flush()?;
                }
            }
            Err(e) => warn!("skipping event: {:#}", e),
        }
    }
    debug!("event stream ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{contact, FakeMessenger};
    use crate::protocol::{Event, Group};
    use futures::stream;

    #[test]
    fn test_parse_blank() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   \t"), None);
    }

    #[test]
    fn test_parse_quit_aliases() {
        for word in ["quit", "exit", "q", "QUIT"] {
            assert_eq!(parse_line(word), Some(ShellCommand::Quit));
        }
    }

    #[test]
    fn test_parse_send_keeps_spacing() {
        assert_eq!(
            parse_line("send +491234567890 Hello   from  the console! "),
            Some(ShellCommand::Send {
                recipient: "+491234567890".to_string(),
                text: "Hello   from  the console!".to_string(),
            })
        );
        assert_eq!(
            parse_line("S 4911 hi"),
            Some(ShellCommand::Send {
                recipient: "4911".to_string(),
                text: "hi".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_send_usage() {
        assert_eq!(parse_line("send"), Some(ShellCommand::SendUsage));
        assert_eq!(parse_line("send 4911"), Some(ShellCommand::SendUsage));
    }

    #[test]
    fn test_parse_list_scopes() {
        assert_eq!(parse_line("list"), Some(ShellCommand::List(ListScope::Top)));
        assert_eq!(parse_line("l ALL"), Some(ShellCommand::List(ListScope::All)));
        assert_eq!(parse_line("list groups"), Some(ShellCommand::List(ListScope::Groups)));
        assert_eq!(parse_line("list everyone"), Some(ShellCommand::List(ListScope::Top)));
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse_line("h"), Some(ShellCommand::Help));
        assert_eq!(parse_line("status"), Some(ShellCommand::Status));
        assert_eq!(
            parse_line("dance now"),
            Some(ShellCommand::Unknown("dance".to_string()))
        );
    }

    async fn run_script(messenger: &FakeMessenger, script: &str) -> String {
        let mut shell = Shell::new(messenger, Vec::new(), 2);
        shell.run(script.as_bytes()).await.unwrap();
        String::from_utf8(shell.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn test_send_to_phone_and_group() {
        let messenger = FakeMessenger::linked();
        let out = run_script(
            &messenger,
            "send +491234567890 Hello there\nsend 120363012345678901-1600000000 Hi group\n",
        )
        .await;

        assert!(out.contains("Sending to contact: 491234567890@s.whatsapp.net"));
        assert!(out.contains("Message sent to 491234567890: Hello there"));
        assert!(out.contains("Sending to group: 120363012345678901-1600000000@g.us"));
        assert!(out.contains("Group message sent: Hi group"));

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].0.is_group());
        assert_eq!(sent[1].1, "Hi group");
    }

    #[tokio::test]
    async fn test_send_failure_keeps_loop_running() {
        let messenger = FakeMessenger {
            send_error: Some("recipient not on WhatsApp".to_string()),
            ..FakeMessenger::linked()
        };
        let out = run_script(&messenger, "send 4911@s.whatsapp.net hi\nhelp\n").await;
        assert!(out.contains("Error: Failed to send message: recipient not on WhatsApp"));
        assert!(out.contains("list groups"));
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let messenger = FakeMessenger::linked();
        let out = run_script(&messenger, "send @g.us hi\n").await;
        assert!(out.contains("Error: Invalid number or group ID"));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_list_contacts_respects_limit() {
        let messenger = FakeMessenger {
            contacts: vec![
                contact("4911", Some("Anna"), None),
                contact("4922", Some("Ben"), None),
                contact("4933", None, Some("Bakery")),
            ],
            ..FakeMessenger::linked()
        };
        let out = run_script(&messenger, "list\nlist all\n").await;
        assert!(out.contains("3 contacts found:"));
        assert!(out.contains("... and 1 more contacts"));
        assert!(out.contains("All 3 contacts:"));
        assert!(out.contains("  Bakery (4933)"));
    }

    #[tokio::test]
    async fn test_list_groups() {
        let messenger = FakeMessenger {
            groups: vec![Group {
                jid: Jid::parse("120363012345678901-1600000000@g.us").unwrap(),
                name: "Climbing".to_string(),
                topic: String::new(),
                participants: Vec::new(),
            }],
            ..FakeMessenger::linked()
        };
        let out = run_script(&messenger, "l groups\n").await;
        assert!(out.contains("Found 1 groups:"));
        assert!(out.contains("1. Climbing"));
    }

    #[tokio::test]
    async fn test_quit_stops_reading() {
        let messenger = FakeMessenger::linked();
        let out = run_script(&messenger, "quit\nsend 4911 never\n").await;
        assert!(out.contains("Goodbye!"));
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_status_and_unknown() {
        let messenger = FakeMessenger::linked();
        let out = run_script(&messenger, "status\nfoo\n\nsend\n").await;
        assert!(out.contains("Gateway: fake (memory)"));
        assert!(out.contains("Logged in: yes"));
        assert!(out.contains("Account: 4900:1@s.whatsapp.net"));
        assert!(out.contains("Unknown command: foo (type 'help' for help)"));
        assert!(out.contains("Usage: send <number/group-id> <message>"));
    }

    #[tokio::test]
    async fn test_prompt() {
        let messenger = FakeMessenger::linked();
        let mut shell = Shell::new(&messenger, Vec::new(), 20).with_prompt(true);
        shell.run("q\n".as_bytes()).await.unwrap();
        let out = String::from_utf8(shell.into_inner()).unwrap();
        assert!(out.contains("whatsapp> Goodbye!"));
    }

    #[tokio::test]
    async fn test_event_feed_survives_bad_item() {
        let events: EventStream = stream::iter(vec![
            Err(anyhow!("Malformed line from gateway")),
            Ok(Event::Unknown),
            Ok(Event::Message {
                sender: "4922@s.whatsapp.net".to_string(),
                text: "hi".to_string(),
            }),
        ])
        .boxed();
        let mut out = Vec::new();
        print_events(events, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\nMessage from 4922@s.whatsapp.net: hi\n"
        );
    }
}
