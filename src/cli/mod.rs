pub mod commands;

use std::io::{self, Write};
use std::sync::Arc;
use uuid::Uuid;

use crate::chat::conversation::Conversation;
use crate::chat::directory::SessionDirectory;
use crate::chat::gateway::{CompletionGateway, SupportGateway};
use crate::chat::questions;
use crate::cli::commands::{Commands, QuestionAction, SessionAction};
use crate::config::AppConfig;
use crate::db::{get_connection, service::DbService};
use crate::llm::ProviderFactory;
use crate::storage::DiskStore;

pub async fn run_cli(command: Commands, config_path: String) {
    let config = AppConfig::load(&config_path).expect("Failed to load config");

    match command {
        Commands::Serve => {
            panic!("Serve command should be intercepted by main.rs to boot actix-web");
        }
        Commands::Session { action } => {
            let pool = get_connection(&config.database).expect("DB error");

            match action {
                SessionAction::Create { user } => {
                    let directory = SessionDirectory::new(pool.clone(), user);
                    match directory.create() {
                        Ok(session) => {
                            println!("Created Session: {} ({})", session.title, session.id)
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                SessionAction::List { user } => {
                    let directory = SessionDirectory::new(pool.clone(), user);
                    match directory.list() {
                        Ok(summaries) => {
                            if summaries.is_empty() {
                                println!("No sessions found.");
                            } else {
                                println!(
                                    "{:<38} | {:<8} | {:<30} | {}",
                                    "ID", "Messages", "Title", "Last Message"
                                );
                                println!("{:-<38}-+-{:-<8}-+-{:-<30}-+-{:-<20}", "", "", "", "");
                                for s in summaries {
                                    println!(
                                        "{:<38} | {:<8} | {:<30} | {}",
                                        s.session.id.to_string(),
                                        s.message_count,
                                        s.session.title,
                                        s.last_message.as_deref().unwrap_or("")
                                    );
                                }
                            }
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                SessionAction::Delete { id, user } => {
                    // Destructive and irreversible, so confirm first
                    print!("Delete session {} and all its messages? This cannot be undone. [y/N] ", id);
                    io::stdout().flush().unwrap();
                    let mut answer = String::new();
                    io::stdin().read_line(&mut answer).unwrap();
                    if !matches!(answer.trim(), "y" | "Y" | "yes") {
                        println!("Aborted.");
                        return;
                    }

                    let directory = SessionDirectory::new(pool.clone(), user);
                    match directory.delete(id) {
                        Ok(()) => println!("Deleted session {}", id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
            }
        }
        Commands::Questions { action } => {
            let pool = get_connection(&config.database).expect("DB error");

            match action {
                QuestionAction::List => {
                    let conn = pool.lock().unwrap();
                    match DbService::list_questions(&conn, false) {
                        Ok(list) => {
                            if list.is_empty() {
                                println!("No questions found.");
                            } else {
                                println!("{:<38} | {:<6} | {:<16} | {}", "ID", "Active", "Category", "Question");
                                println!("{:-<38}-+-{:-<6}-+-{:-<16}-+-{:-<30}", "", "", "", "");
                                for q in list {
                                    println!(
                                        "{:<38} | {:<6} | {:<16} | {}",
                                        q.id.to_string(),
                                        q.is_active,
                                        q.category.as_deref().unwrap_or("-"),
                                        q.question
                                    );
                                }
                            }
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                QuestionAction::Add { question, category } => {
                    let conn = pool.lock().unwrap();
                    match DbService::insert_question(&conn, &question, category.as_deref(), true) {
                        Ok(q) => println!("Added question {}", q.id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                QuestionAction::Toggle { id } => {
                    let conn = pool.lock().unwrap();
                    let existing = match DbService::get_question(&conn, id) {
                        Ok(Some(q)) => q,
                        Ok(None) => {
                            eprintln!("Question {} not found.", id);
                            return;
                        }
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            return;
                        }
                    };
                    match DbService::set_question_active(&conn, id, !existing.is_active) {
                        Ok(Some(q)) => println!("Question {} is now active={}", q.id, q.is_active),
                        Ok(None) => eprintln!("Question {} not found.", id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                QuestionAction::Delete { id } => {
                    let conn = pool.lock().unwrap();
                    match DbService::delete_question(&conn, id) {
                        Ok(()) => println!("Deleted question {}", id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                QuestionAction::Seed => match questions::seed_samples(&pool) {
                    Ok(count) => println!("Seeded {} sample questions.", count),
                    Err(e) => eprintln!("Error: {}", e),
                },
            }
        }
        Commands::Chat { session, user } => {
            run_repl(session, user, config).await;
        }
    }
}

async fn run_repl(session_id: Uuid, user_id: Uuid, config: AppConfig) {
    let pool = get_connection(&config.database).expect("DB Error");

    let llm = ProviderFactory::create_default(&config).expect("Failed to init LLM provider");
    let gateway: Arc<dyn CompletionGateway> = Arc::new(SupportGateway::new(llm, pool.clone()));
    let store = DiskStore::new(&config.storage);

    let mut conversation = match Conversation::open(pool.clone(), user_id, session_id) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Could not open session {}: {}", session_id, e);
            return;
        }
    };

    println!("--- Voltdesk Terminal Chat ---");
    println!("Session: {}", conversation.session().title);
    println!("Type /exit to quit.");
    println!("------------------------------");

    for entry in conversation.entries() {
        let who = if entry.is_user { "You" } else { "Evolve" };
        println!("{}> {}", who, entry.content);
    }

    let suggestions = if conversation.suggestions_visible() {
        let list = questions::active_questions(&pool);
        if !list.is_empty() {
            println!("\nCommon questions (type a number to ask it):");
            for (i, q) in list.iter().enumerate() {
                println!("  {}. {}", i + 1, q.question);
            }
        }
        list
    } else {
        Vec::new()
    };

    loop {
        print!("\nYou> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap();
        let text = input.trim();

        if text.is_empty() {
            continue;
        }
        if text == "/exit" || text == "/quit" {
            break;
        }

        let picked = if conversation.suggestions_visible() {
            text.parse::<usize>()
                .ok()
                .and_then(|n| suggestions.get(n.wrapping_sub(1)))
                .map(|q| q.question.clone())
        } else {
            None
        };

        let result = match picked {
            Some(question) => {
                conversation
                    .select_suggestion(&store, gateway.as_ref(), &question)
                    .await
            }
            None => {
                conversation
                    .send_message(&store, gateway.as_ref(), text, None)
                    .await
            }
        };

        match result {
            Ok(Some(outcome)) => {
                println!("Evolve> {}", outcome.reply);
                if let Some(err) = outcome.gateway_error {
                    eprintln!("(assistant unavailable: {})", err);
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}
