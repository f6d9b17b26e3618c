//! Interactive loop.
//!
//! Reads commands from stdin while applying completions as they arrive, so
//! several flows can be in flight while the user keeps editing.

use anyhow::Result;
use pyrunner_kernel::{
    ChatSession, Coordinator, CredentialStore, Resolution, Segment, SlotState, Subscription,
    parse_segments,
};
use pyrunner_types::{ChatRole, Credential, FlowKind};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
commands:
  :show                 print the document
  :edit                 replace the document (end input with a line holding only '.')
  :append               append lines to the document (same terminator)
  :clear                empty the document
  :annotate <reqs>      add comments following the requirements
  :tests [docs]         generate test cases, optionally from documentation
  :chat <text>          ask about the code (plain text without ':' works too)
  :history              print the conversation
  :suggest              request a continuation
  :accept | :reject     decide on the proposed suggestion
  :insert <n>           append code snippet n of the last reply to the document
  :copy <n>             copy code snippet n of the last reply to the clipboard
  :key <value>          set and remember the API key
  :forget-key           forget the API key
  :pending              list requests in flight
  :wait                 wait for every request in flight
  :quit";

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Quit,
}

pub struct Repl {
    coordinator: Coordinator,
    credential: Option<Credential>,
    store: Option<CredentialStore>,
    notes: Subscription,
}

impl Repl {
    pub fn new(
        coordinator: Coordinator,
        credential: Option<Credential>,
        store: Option<CredentialStore>,
    ) -> Self {
        let notes = coordinator.notifications().subscribe("notify.>");
        Self {
            coordinator,
            credential,
            store,
            notes,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");
        if self.credential.is_none() {
            let gated: Vec<String> = FlowKind::all()
                .into_iter()
                .filter(FlowKind::requires_credential)
                .map(|k| k.as_str().to_owned())
                .collect();
            println!("no API key set; {} need one (:key <value>)", gated.join(" and "));
        }

        loop {
            let has_pending = self.coordinator.has_pending();
            tokio::select! {
                line = input.next_line() => {
                    let Some(line) = line? else { break };
                    if self.handle(line.trim_end(), &mut input).await? == Step::Quit {
                        break;
                    }
                }
                Some(resolution) = self.coordinator.next_completion(), if has_pending => {
                    self.report(&resolution);
                }
            }
            self.print_notifications();
        }

        if self.coordinator.has_pending() {
            tracing::info!(
                pending = self.coordinator.pending().len(),
                "exiting with requests in flight"
            );
        }
        Ok(())
    }

    async fn handle(&mut self, line: &str, input: &mut Input) -> Result<Step> {
        if line.is_empty() {
            return Ok(Step::Continue);
        }
        let (command, rest) = match line.strip_prefix(':') {
            Some(cmd) => cmd.split_once(' ').unwrap_or((cmd, "")),
            None => ("chat", line),
        };
        let rest = rest.trim();

        // Dispatch errors are already on the notification bus.
        match command {
            "show" => self.show(),
            "edit" => {
                let text = read_block(input).await?;
                self.coordinator.edit_document(text);
            }
            "append" => {
                let text = read_block(input).await?;
                let mut doc = self.coordinator.document().text().to_string();
                if !doc.is_empty() && !doc.ends_with('\n') {
                    doc.push('\n');
                }
                doc.push_str(&text);
                self.coordinator.edit_document(doc);
            }
            "clear" => self.coordinator.clear_document(),
            "annotate" => {
                let _ = self.coordinator.annotate(rest);
            }
            "tests" => {
                let docs = (!rest.is_empty()).then(|| rest.to_string());
                let _ = self.coordinator.generate_tests(docs);
            }
            "chat" => {
                self.coordinator.set_chat_draft(rest);
                let _ = self.coordinator.submit_chat_draft(self.credential.clone());
            }
            "history" => print_history(self.coordinator.chat()),
            "suggest" => {
                let _ = self.coordinator.request_suggestion(self.credential.clone());
            }
            "accept" => match self.coordinator.accept_suggestion() {
                Some(s) => println!("appended {} chars", s.text.len()),
                None => println!("no suggestion to accept"),
            },
            "reject" => {
                if self.coordinator.reject_suggestion().is_none() {
                    println!("no suggestion to reject");
                }
            }
            "insert" => {
                if let Some(snippet) = self.snippet(rest) {
                    self.coordinator.insert_snippet(&snippet);
                }
            }
            "copy" => {
                if let Some(snippet) = self.snippet(rest) {
                    copy_to_clipboard(&Coordinator::copy_snippet(&snippet));
                }
            }
            "key" => self.set_key(rest),
            "forget-key" => self.forget_key(),
            "pending" => self.list_pending(),
            "wait" => {
                for resolution in self.coordinator.settle().await {
                    self.report(&resolution);
                }
            }
            "help" => println!("{HELP}"),
            "quit" | "q" => return Ok(Step::Quit),
            other => println!("unknown command :{other} (try :help)"),
        }
        Ok(Step::Continue)
    }

    fn show(&self) {
        let doc = self.coordinator.document();
        println!("--- document (rev {}) ---", doc.revision());
        println!("{}", doc.text());
        println!("---");
        match self.coordinator.suggestion().state() {
            SlotState::Idle => {}
            SlotState::Pending => println!("suggestion: pending"),
            SlotState::Proposed(s) => println!("suggestion:\n{}", s.text),
        }
    }

    fn snippet(&self, arg: &str) -> Option<pyrunner_kernel::CodeSnippet> {
        let snippets = self.coordinator.latest_reply_snippets();
        let found = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| snippets.get(i).cloned());
        if found.is_none() {
            println!("no snippet {arg:?}; the last reply has {}", snippets.len());
        }
        found
    }

    fn set_key(&mut self, value: &str) {
        let credential = Credential::new(value);
        if credential.is_blank() {
            println!("usage: :key <value>");
            return;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&credential) {
                tracing::warn!(error = %e, "could not persist API key");
            }
        }
        self.credential = Some(credential);
        println!("API key set");
    }

    fn forget_key(&mut self) {
        self.credential = None;
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!(error = %e, "could not clear stored API key");
            }
        }
        println!("API key forgotten");
    }

    fn list_pending(&self) {
        let pending = self.coordinator.pending();
        if pending.is_empty() {
            println!("nothing in flight");
        }
        for op in pending {
            println!(
                "{} {:<14} {:.1}s",
                op.id.short(),
                op.kind.as_str(),
                op.started_at.elapsed().as_secs_f32()
            );
        }
    }

    fn report(&self, resolution: &Resolution) {
        match resolution {
            Resolution::Applied {
                kind: FlowKind::Chat,
                request,
            } => {
                let reply = self
                    .coordinator
                    .chat()
                    .messages()
                    .iter()
                    .rev()
                    .find(|m| m.role == ChatRole::Assistant && m.request == Some(*request));
                if let Some(reply) = reply {
                    print_reply(&reply.content);
                }
            }
            Resolution::Applied {
                kind: FlowKind::GenerateTests,
                ..
            } => {
                if let Some(listing) = self.coordinator.test_listing() {
                    println!("--- test cases ---\n{listing}\n---");
                }
            }
            Resolution::Applied {
                kind: FlowKind::Suggest,
                ..
            } => {
                if let Some(s) = self.coordinator.suggestion().current() {
                    println!("--- suggestion (:accept / :reject) ---\n{}\n---", s.text);
                }
            }
            Resolution::Discarded { request, kind } => {
                tracing::debug!(request = %request.short(), %kind, "superseded result dropped");
            }
            _ => {}
        }
    }

    fn print_notifications(&mut self) {
        while let Some(note) = self.notes.try_recv() {
            println!("[{}] {}", note.title, note.message);
        }
    }
}

/// Read lines until one holding only `.`.
async fn read_block(input: &mut Input) -> Result<String> {
    let mut lines = Vec::new();
    while let Some(line) = input.next_line().await? {
        if line == "." {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn print_reply(content: &str) {
    let mut n = 0;
    for segment in parse_segments(content) {
        match segment {
            Segment::Prose(text) => print!("{text}"),
            Segment::Code(snippet) => {
                n += 1;
                let lang = snippet.language().unwrap_or("");
                println!("\n[{n}] ```{lang}\n{}\n```", snippet.code);
            }
        }
    }
    println!();
}

fn print_history(chat: &ChatSession) {
    for message in chat.messages() {
        println!("{:>3} {}: {}", message.ordinal, message.role.as_str(), message.content);
    }
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string())) {
        Ok(()) => println!("copied {} chars", text.len()),
        Err(e) => {
            tracing::warn!(error = %e, "clipboard unavailable");
            println!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyrunner_kernel::{FlowInvoker, InvokerSettings, ScriptedProvider, StalePolicy};
    use std::sync::Arc;

    fn repl() -> Repl {
        let provider = Arc::new(ScriptedProvider::new());
        let invoker = FlowInvoker::new(provider, InvokerSettings::default());
        Repl::new(Coordinator::new(invoker, StalePolicy::Apply), None, None)
    }

    #[tokio::test]
    async fn test_key_is_trimmed_and_forgotten() {
        let mut repl = repl();
        repl.set_key("  sk-abc  ");
        assert_eq!(repl.credential.as_ref().unwrap().expose(), "sk-abc");
        repl.forget_key();
        assert!(repl.credential.is_none());
    }

    #[tokio::test]
    async fn test_snippet_index_is_one_based() {
        let repl = repl();
        assert!(repl.snippet("1").is_none());
        assert!(repl.snippet("0").is_none());
        assert!(repl.snippet("x").is_none());
    }
}
