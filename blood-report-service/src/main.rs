use anyhow::Context as _;
use blood_report_service::{
    AnalyzeRequest, ServiceError, Worker, create_analysis_context, create_app,
    config::{DEFAULT_FILE, DEFAULT_QUERY, DatabaseArgs, LlmArgs, QueueArgs},
    submit_analysis_job,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Blood test report analysis by a crew of five AI agents, behind a persistent job queue.
#[derive(Parser, Debug)]
#[command(name = "blood-report", version, about)]
struct Cli {
    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the job table and the queue tables.
    InitDb {
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        queue: QueueArgs,
    },

    /// Persist a job and queue it for a worker.
    Submit {
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,
        #[arg(long, default_value = DEFAULT_FILE)]
        file: String,
        #[arg(long)]
        user: Option<String>,
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        queue: QueueArgs,
    },

    /// Process queued jobs until interrupted.
    Worker {
        /// Number of independent worker loops.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        queue: QueueArgs,
        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Run the crew inline, without the queue, and print the report.
    Run {
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,
        #[arg(long, default_value = DEFAULT_FILE)]
        file: String,
        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Show one job and its final report.
    Status {
        id: i64,
        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// List recent jobs, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
        #[command(flatten)]
        db: DatabaseArgs,
        #[command(flatten)]
        queue: QueueArgs,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Flips to true on Ctrl-C
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = tx.send(true);
    });
    rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Command::InitDb { db, queue } => {
            db.connect().await?;
            queue.connect().await?;
            println!("Database tables created.");
        }

        Command::Submit {
            query,
            file,
            user,
            db,
            queue,
        } => {
            let store = db.connect().await?;
            let queue = queue.connect().await?;
            let request = AnalyzeRequest {
                query,
                file_path: file,
                user_id: user,
            };

            match submit_analysis_job(&store, &queue, request).await {
                Ok(submission) => {
                    println!("result_id: {}", submission.result_id);
                    println!("task_id:   {}", submission.task_id);
                }
                Err(e @ ServiceError::DocumentNotFound { .. }) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("No job was created: {e}");
                    std::process::exit(1);
                }
            }
        }

        Command::Worker {
            concurrency,
            db,
            queue,
            llm,
        } => {
            let pipeline = Arc::new(llm.build_pipeline()?);
            let store = db.connect().await?;
            let poll_interval = queue.poll_interval();
            let queue = Arc::new(queue.connect().await?);

            info!(concurrency, "Starting workers");
            Worker::new(store, queue, pipeline)
                .with_poll_interval(poll_interval)
                .run_concurrent(concurrency, shutdown_signal())
                .await;
        }

        Command::Run { query, file, llm } => {
            let pipeline = llm.build_pipeline()?;
            let context = create_analysis_context(&query, &file).await;
            let result = pipeline
                .execute(context)
                .await
                .context("analysis pipeline failed")?;
            println!("{}", result.output);
        }

        Command::Status { id, db } => {
            let store = db.connect().await?;
            let record = store
                .get(id)
                .await?
                .ok_or(ServiceError::JobNotFound(id))?;

            println!("id:         {}", record.id);
            println!("task_id:    {}", record.task_id);
            println!("user_id:    {}", record.user_id);
            println!("file_path:  {}", record.file_path);
            println!("query:      {}", record.query);
            println!("status:     {}", record.status);
            println!("created_at: {}", record.created_at.to_rfc3339());
            if let Some(updated_at) = record.updated_at {
                println!("updated_at: {}", updated_at.to_rfc3339());
            }
            match record.final_report {
                Some(report) if record.status.is_terminal() => println!("\n{report}"),
                _ => println!("\nNo report yet."),
            }
        }

        Command::List { limit, db } => {
            let store = db.connect().await?;
            for record in store.list(limit).await? {
                println!(
                    "{:>6}  {:<8}  {}  {}",
                    record.id,
                    record.status.as_str(),
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.file_path
                );
            }
        }

        Command::Serve { port, db, queue } => {
            let store = db.connect().await?;
            let queue = Arc::new(queue.connect().await?);
            let app = create_app(store, queue);

            let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
            let addr = listener.local_addr()?;

            info!("Blood Test Report Analyser starting on {}", addr);
            info!("API Documentation available at http://{}/", addr);
            info!("Health check endpoint: http://{}/health", addr);
            info!("Analysis endpoint: POST http://{}/analyze", addr);

            let mut shutdown = shutdown_signal();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await?;
        }
    }

    Ok(())
}
