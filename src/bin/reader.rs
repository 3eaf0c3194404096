use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use textbook::client::auth::{self, Background, SignupForm};
use textbook::client::chapter_view::{self, ChapterView, TranslateStep};
use textbook::client::chat::{ChatPanel, Role, TranslationToggle, Viewport};
use textbook::client::header::Header;
use textbook::client::session::{FileStorage, SessionStore, Storage};
use textbook::client::{Outcome, Ticket};
use textbook::config::{self, Config};
use textbook::error::ApiError;
use textbook::models::{ChapterEntry, ChatResponse, PersonalizeResponse, TranslateResponse};
use textbook::services::backend::{Backend, BackendClient};
use textbook::services::registry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "textbook-reader",
    about = "Read the Physical AI textbook and talk to its assistant from a terminal"
)]
struct ReaderCli {
    /// Backend base URL (falls back to TEXTBOOK_API_URL, then API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding the persisted session
    #[arg(long, env = "TEXTBOOK_STATE_DIR", default_value = ".textbook")]
    state_dir: PathBuf,

    /// Timeout for backend requests, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Chapter to open on start
    #[arg(long, default_value = registry::FIRST_CHAPTER)]
    chapter: String,
}

const HELP: &str = "\
Chapters:  list | open <slug> | next | prev | show | personalize | translate | reset
Assistant: select <text> | ask <question> | history | tr <message-id> | untr <message-id> | expand
Account:   signup | login | logout | whoami
           help | quit";

/// A backend answer on its way back to the reader loop. Chapter results
/// carry the view they were started from so a reopened chapter never picks
/// up an answer meant for an earlier visit.
enum Completion {
    Answer(Ticket, Result<ChatResponse, ApiError>),
    MessageTranslation {
        ticket: Ticket,
        message_id: String,
        result: Result<TranslateResponse, ApiError>,
    },
    Personalized {
        view: u64,
        ticket: Ticket,
        result: Result<PersonalizeResponse, ApiError>,
    },
    ChapterTranslation {
        view: u64,
        ticket: Ticket,
        result: Result<TranslateResponse, ApiError>,
    },
}

struct Reader<S: Storage> {
    backend: Arc<BackendClient>,
    store: SessionStore<S>,
    header: Header,
    panel: ChatPanel,
    view: ChapterView,
    view_id: u64,
    viewport: Viewport,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S: Storage> Reader<S> {
    fn new(
        backend: BackendClient,
        store: SessionStore<S>,
        entry: &'static ChapterEntry,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let mut reader = Reader {
            backend: Arc::new(backend),
            header: Header::new(store.subscribe()),
            panel: ChatPanel::new(store.subscribe()),
            view: ChapterView::new(entry),
            view_id: 0,
            viewport: Viewport {
                width: 1280,
                height: 800,
            },
            store,
            completions,
        };
        reader.panel.open();
        (reader, rx)
    }

    /// Runs `request` off the input loop; its result comes back through
    /// the completion channel.
    fn spawn<F>(&self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            if completions.send(request.await).is_err() {
                tracing::debug!("reader closed before a response arrived");
            }
        });
    }

    fn open_chapter(&mut self, slug: &str) {
        match registry::resolve(slug) {
            Some(entry) => {
                self.view = ChapterView::new(entry);
                self.view_id += 1;
                self.show();
            }
            None => println!("No chapter named '{slug}'. Try `list`."),
        }
    }

    fn show(&self) {
        let entry = self.view.entry();
        println!("\nModule {} / {}  {}\n", entry.module_id, entry.chapter_id, entry.title);
        println!("{}\n", self.view.displayed_text());
        if let Some(prev) = entry.prev {
            println!("  prev: {} ({})", prev.title, prev.slug);
        }
        if let Some(next) = entry.next {
            println!("  next: {} ({})", next.title, next.slug);
        }
    }

    fn list(&self) {
        for module in registry::modules() {
            println!("Module {}: {} ({})", module.number, module.title, module.subtitle);
            for slug in module.chapters {
                if let Some(entry) = registry::resolve(slug) {
                    let marker = if entry.slug == self.view.entry().slug { '*' } else { ' ' };
                    println!(" {marker} {:<5} {:<32} {}", entry.chapter_id, entry.title, entry.slug);
                }
            }
        }
    }

    fn history(&self) {
        for message in self.panel.messages() {
            let who = match message.role() {
                Role::User => "you",
                Role::Assistant => "assistant",
            };
            println!("[{}] {who}: {}", message.id(), message.displayed());
            for source in message.sources() {
                println!("    source: {} {} ({:.2})", source.chapter, source.title, source.relevance);
            }
        }
    }

    fn report(&self, outcome: Outcome, notice: Option<&str>) {
        match outcome {
            Outcome::Applied => {}
            Outcome::Failed => println!("{}", notice.unwrap_or("Request failed.")),
            Outcome::Stale => println!("(result discarded)"),
        }
    }

    fn ask(&mut self, question: &str) {
        match self.panel.begin_send(question) {
            Ok(pending) => {
                println!("(waiting for the assistant)");
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    let result = backend.ask(&pending.request).await;
                    Completion::Answer(pending.ticket, result)
                });
            }
            Err(err) => println!("{err}"),
        }
    }

    fn translate_message(&mut self, id: &str) {
        match self.panel.toggle_translation(id) {
            Ok(TranslationToggle::Requested(pending)) => {
                println!("(translating)");
                let backend = Arc::clone(&self.backend);
                self.spawn(async move {
                    let result = backend.translate(&pending.request).await;
                    Completion::MessageTranslation {
                        ticket: pending.ticket,
                        message_id: pending.message_id,
                        result,
                    }
                });
            }
            Ok(TranslationToggle::Shown | TranslationToggle::Hidden) => {
                if let Some(message) = self.panel.message(id) {
                    println!("{}", message.displayed());
                }
            }
            Err(err) => println!("{err}"),
        }
    }

    fn personalize(&mut self) {
        let session = self.store.get();
        let level = chapter_view::user_level(session.as_ref());
        match self.view.begin_personalize(level) {
            Ok(pending) => {
                println!("(personalizing)");
                let backend = Arc::clone(&self.backend);
                let view = self.view_id;
                self.spawn(async move {
                    let result = backend.personalize(&pending.request).await;
                    Completion::Personalized {
                        view,
                        ticket: pending.ticket,
                        result,
                    }
                });
            }
            Err(err) => println!("{err}"),
        }
    }

    fn toggle_translation(&mut self) {
        match self.view.begin_translate() {
            Ok(TranslateStep::Reverted) => self.show(),
            Ok(TranslateStep::Requested(pending)) => {
                println!("(translating)");
                let backend = Arc::clone(&self.backend);
                let view = self.view_id;
                self.spawn(async move {
                    let result = backend.translate(&pending.request).await;
                    Completion::ChapterTranslation {
                        view,
                        ticket: pending.ticket,
                        result,
                    }
                });
            }
            Err(err) => println!("{err}"),
        }
    }

    /// Folds a finished request into the visible state.
    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Answer(ticket, result) => {
                let outcome = self.panel.complete_send(ticket, result);
                self.report(outcome, self.panel.notice());
                if outcome == Outcome::Applied {
                    if let Some(answer) = self.panel.messages().last() {
                        println!("[{}] {}", answer.id(), answer.displayed());
                    }
                }
            }
            Completion::MessageTranslation {
                ticket,
                message_id,
                result,
            } => {
                let outcome = self.panel.complete_translation(ticket, &message_id, result);
                self.report(outcome, self.panel.notice());
                if outcome == Outcome::Applied {
                    if let Some(message) = self.panel.message(&message_id) {
                        println!("[{}] {}", message.id(), message.displayed());
                    }
                }
            }
            Completion::Personalized { view, ticket, result } => {
                if view != self.view_id {
                    tracing::debug!(?ticket, "personalization for a closed chapter");
                    return;
                }
                match self.view.complete_personalize(ticket, result) {
                    Outcome::Applied => self.show(),
                    outcome => self.report(outcome, self.view.notice()),
                }
            }
            Completion::ChapterTranslation { view, ticket, result } => {
                if view != self.view_id {
                    tracing::debug!(?ticket, "translation for a closed chapter");
                    return;
                }
                match self.view.complete_translate(ticket, result) {
                    Outcome::Applied => self.show(),
                    outcome => self.report(outcome, self.view.notice()),
                }
            }
        }
    }

    async fn signup<R: AsyncBufRead + Unpin>(&mut self, input: &mut Lines<R>) -> Result<()> {
        let mut form = SignupForm::new();
        loop {
            let name = prompt(input, "Full name").await?;
            let email = prompt(input, "Email").await?;
            let password = prompt(input, "Password (8+ characters)").await?;
            match form.submit_account(&name, &email, &password) {
                Ok(()) => break,
                Err(err) => println!("{err}"),
            }
        }
        loop {
            let programming = prompt(input, "Programming experience [beginner/intermediate/advanced]").await?;
            let hardware = prompt(input, "Hardware experience [none/some/extensive]").await?;
            let interest = prompt(input, "Primary interest [ros2/simulation/ai/all]").await?;
            let background = match Background::parse(&programming, &hardware, &interest) {
                Ok(background) => background,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            match form.submit(self.backend.as_ref(), &mut self.store, background).await {
                Ok(session) => {
                    println!("Welcome, {}!", session.user.name);
                    return Ok(());
                }
                Err(err) => {
                    println!("{err}");
                    if prompt(input, "Try again? [y/N]").await?.to_lowercase() != "y" {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn login<R: AsyncBufRead + Unpin>(&mut self, input: &mut Lines<R>) -> Result<()> {
        let email = prompt(input, "Email").await?;
        let password = prompt(input, "Password").await?;
        match auth::sign_in(self.backend.as_ref(), &mut self.store, &email, &password).await {
            Ok(session) => println!("Signed in as {}.", session.user.name),
            Err(err) => println!("{err}"),
        }
        Ok(())
    }

    /// Runs one command; `false` ends the session. Backend requests are
    /// started here and finish later through `apply`.
    async fn dispatch<R: AsyncBufRead + Unpin>(&mut self, line: &str, input: &mut Lines<R>) -> Result<bool> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match command {
            "" => {}
            "help" => println!("{HELP}"),
            "quit" | "exit" => return Ok(false),
            "list" => self.list(),
            "open" => self.open_chapter(rest),
            "next" | "prev" => {
                let entry = self.view.entry();
                let link = if command == "next" { entry.next } else { entry.prev };
                match link {
                    Some(link) => self.open_chapter(link.slug),
                    None => println!("No {command} chapter."),
                }
            }
            "show" => self.show(),
            "personalize" => self.personalize(),
            "translate" => self.toggle_translation(),
            "reset" => {
                self.view.reset();
                self.show();
            }
            "select" => {
                if self.panel.capture_selection(rest) {
                    println!("Selection will be sent with your next question.");
                } else {
                    self.panel.clear_selection();
                    println!("Selection cleared.");
                }
            }
            "ask" => self.ask(rest),
            "history" => self.history(),
            "tr" => self.translate_message(rest),
            "untr" => match self.panel.reset_translation(rest) {
                Ok(()) => println!("Translation forgotten."),
                Err(err) => println!("{err}"),
            },
            "expand" => {
                self.panel.toggle_expanded(self.viewport);
                let size = self.panel.size();
                println!("Panel is now {}x{}.", size.width, size.height);
            }
            "signup" => self.signup(input).await?,
            "login" => self.login(input).await?,
            "logout" => match auth::sign_out(&mut self.store) {
                Ok(()) => println!("Signed out."),
                Err(err) => println!("{err}"),
            },
            "whoami" => println!("{}", self.header.label()),
            other => println!("Unknown command '{other}'. Type `help`."),
        }
        Ok(true)
    }
}

async fn prompt<R: AsyncBufRead + Unpin>(input: &mut Lines<R>, label: &str) -> Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let line = input
        .next_line()
        .await?
        .context("input closed")?;
    Ok(line.trim().to_string())
}

fn ready() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = ReaderCli::parse();
    let config = Config {
        api_base_url: config::resolve_api_url(cli.api_url, |key| std::env::var(key).ok()),
        bind: config::DEFAULT_BIND.to_string(),
        timeout: Duration::from_secs(cli.timeout_secs.max(1)),
    };
    let backend = BackendClient::new(&config)?;
    tracing::info!(api_url = backend.api_url(), state_dir = %cli.state_dir.display(), "starting reader");

    let store = SessionStore::open(FileStorage::new(&cli.state_dir));
    let entry = registry::resolve(&cli.chapter)
        .with_context(|| format!("unknown chapter '{}'", cli.chapter))?;
    let (mut reader, mut completions) = Reader::new(backend, store, entry);

    println!("Signed in as: {}", reader.header.label());
    println!("{HELP}");
    reader.show();

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    ready()?;
    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !reader.dispatch(line.trim(), &mut input).await? {
                    break;
                }
            }
            Some(completion) = completions.recv() => {
                println!();
                reader.apply(completion);
            }
        }
        ready()?;
    }
    Ok(())
}
