use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use learnify::error::AppError;
use learnify::models::{Category, LoginRequest, NoteForm, SignupRequest};
use learnify::services::{BlobStore, ChatCompletion, FileUpload, SessionStore};
use learnify::workflow::{BoardView, Notification};
use learnify::{
    logger, server, AuthFlow, BackendClient, ChatSession, CloudinaryClient, CommunityFlow, Config,
    GeminiClient, NoteSubmissionFlow, NotesCatalog,
};

#[derive(Debug, Parser)]
#[command(name = "learnify", version, about = "Learnify 学习资料分享平台")]
struct Cli {
    /// TOML 配置文件，未指定时只读取环境变量
    #[arg(long, global = true, env = "LEARNIFY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动后端服务
    Serve,
    /// 笔记
    #[command(subcommand)]
    Notes(NotesCommand),
    /// 社区问答
    #[command(subcommand)]
    Community(CommunityCommand),
    /// 向 AI 助手提问
    Chat {
        /// 直接调用文本生成 API（需要本地配置密钥）
        #[arg(long)]
        direct: bool,
        prompt: Vec<String>,
    },
    /// 登录
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// 注册
    Signup(SignupArgs),
    /// 退出登录
    Logout,
}

#[derive(Debug, Subcommand)]
enum NotesCommand {
    /// 上传文件并创建笔记
    Add(AddNoteArgs),
    /// 按分类列出笔记（按学年分组）
    List {
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Debug, Args)]
struct AddNoteArgs {
    #[arg(long)]
    subject_code: String,
    #[arg(long)]
    subject_name: String,
    /// 1..4
    #[arg(long)]
    year: String,
    /// Books / Notes / "Previous Year" / Other
    #[arg(long)]
    category: String,
    /// 直接上传到对象存储，而不是经过后端
    #[arg(long)]
    direct: bool,
    file: PathBuf,
}

#[derive(Debug, Subcommand)]
enum CommunityCommand {
    /// 列出问题与回答
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// 发布问题
    Ask { problem: Vec<String> },
    /// 回答问题
    Answer {
        problem_id: String,
        #[arg(long)]
        name: String,
        answer: Vec<String>,
    },
    /// 展开某个问题的更多回答
    More {
        problem_id: String,
        /// 点击"显示更多"的次数
        #[arg(long, default_value_t = 1)]
        times: usize,
    },
}

#[derive(Debug, Args)]
struct SignupArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    student_year: String,
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };
    debug!("后端地址: {}", config.backend_base_url);

    let backend = Arc::new(BackendClient::new(&config));

    match cli.command {
        Command::Serve => server::serve(&config).await?,
        Command::Notes(NotesCommand::Add(args)) => add_note(&config, backend, args).await?,
        Command::Notes(NotesCommand::List { category }) => list_notes(backend, category).await?,
        Command::Community(action) => community(backend, action).await?,
        Command::Chat { direct, prompt } => {
            let client: Arc<dyn ChatCompletion> = if direct {
                Arc::new(GeminiClient::new(&config))
            } else {
                backend
            };
            chat(&config, client, &prompt.join(" ")).await?;
        }
        Command::Login { phone, password } => {
            let flow = auth_flow(&config, backend);
            let response = flow.login(LoginRequest { phone, password }).await?;
            println!("✓ {}", response.message);
        }
        Command::Signup(args) => {
            let flow = auth_flow(&config, backend);
            let response = flow
                .signup(SignupRequest {
                    name: args.name,
                    phone: args.phone,
                    student_year: args.student_year,
                    password: args.password,
                })
                .await?;
            println!("✓ {}", response.message);
        }
        Command::Logout => auth_flow(&config, backend).logout().await?,
    }

    Ok(())
}

fn auth_flow(config: &Config, backend: Arc<BackendClient>) -> AuthFlow {
    AuthFlow::new(backend, SessionStore::new(config.session_file.clone()))
}

async fn add_note(config: &Config, backend: Arc<BackendClient>, args: AddNoteArgs) -> Result<()> {
    let file = FileUpload::from_path(&args.file)
        .await
        .with_context(|| format!("无法读取文件: {}", args.file.display()))?;

    let blob_store: Arc<dyn BlobStore> = if args.direct {
        Arc::new(CloudinaryClient::new(config))
    } else {
        backend.clone()
    };
    let mut flow = NoteSubmissionFlow::new(blob_store, backend);

    let form = NoteForm {
        subject_code: args.subject_code,
        subject_name: args.subject_name,
        year: args.year,
        category: args.category,
        file: String::new(),
    };

    let result = flow.submit(form, Some(file)).await;
    if let Some(notification) = flow.state_mut().take_notification() {
        print_notification(&notification);
    }
    report(result)?;
    Ok(())
}

async fn list_notes(backend: Arc<BackendClient>, category: Option<String>) -> Result<()> {
    let category = category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<Category>)
        .transpose()
        .map_err(|message| AppError::invalid_field("category", message))?;

    let mut catalog = NotesCatalog::new(backend);
    catalog.load(category).await?;

    for tab in catalog.tabs() {
        println!("== {} ==", tab.label);
        if let Some(message) = &tab.empty_message {
            println!("  {}", message);
        }
        for note in &tab.notes {
            println!(
                "  [{}] {} - {} -> {} ({})",
                note.category,
                note.subject_code,
                note.subject_name,
                note.file,
                note.download_name()
            );
        }
    }
    Ok(())
}

async fn community(backend: Arc<BackendClient>, action: CommunityCommand) -> Result<()> {
    let mut flow = CommunityFlow::new(backend);

    match action {
        CommunityCommand::List { filter } => {
            flow.load(filter.as_deref()).await?;
        }
        CommunityCommand::Ask { problem } => {
            report(flow.submit_problem(&problem.join(" ")).await)?;
        }
        CommunityCommand::Answer {
            problem_id,
            name,
            answer,
        } => {
            flow.load(None).await?;
            flow.board_mut().toggle_answer_panel(&problem_id);
            report(flow.submit_answer(&problem_id, &name, &answer.join(" ")).await)?;
        }
        CommunityCommand::More { problem_id, times } => {
            flow.load(None).await?;
            for _ in 0..times {
                if !flow.board_mut().show_more(&problem_id) {
                    break;
                }
            }
        }
    }

    print_board(&flow.board().render());
    Ok(())
}

async fn chat(config: &Config, client: Arc<dyn ChatCompletion>, prompt: &str) -> Result<()> {
    let mut session = ChatSession::new(client, Duration::from_millis(config.reveal_delay_ms));
    let mut frames = session.subscribe();

    if !session.ask(prompt).await? {
        println!("(空白问题，未发送)");
        return Ok(());
    }

    // 只打印新增的部分
    let mut printed = 0;
    let mut stdout = std::io::stdout();
    loop {
        let (text, done) = {
            let frame = frames.borrow_and_update();
            (frame.text.clone(), frame.done)
        };
        if let Some(delta) = text.get(printed..) {
            print!("{}", delta);
            stdout.flush()?;
            printed = text.len();
        }
        if done || frames.changed().await.is_err() {
            break;
        }
    }
    println!();

    session.finish_reveal().await;
    Ok(())
}

fn print_board(view: &BoardView) {
    match view {
        BoardView::Empty { message } => println!("{}", message),
        BoardView::Problems(cards) => {
            for card in cards {
                println!("[{}] {}", card.id, card.problem);
                for line in &card.answers {
                    println!("    {}: {} ({})", line.label, line.answer, line.name);
                }
                if card.can_show_more {
                    println!("    ... {} more", card.hidden_answers);
                }
            }
        }
    }
}

fn print_notification(notification: &Notification) {
    if notification.is_error() {
        eprintln!("{}", notification);
    } else {
        println!("{}", notification);
    }
}

/// 校验错误逐字段打印，其余错误交给 anyhow
fn report<T>(result: Result<T, AppError>) -> Result<T> {
    match result {
        Err(AppError::Validation(errors)) => {
            for (field, message) in &errors.fields {
                eprintln!("  {}: {}", field, message);
            }
            Err(AppError::Validation(errors).into())
        }
        other => Ok(other?),
    }
}
