use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "attendance-cli")]
#[command(about = "Management CLI for the Attendance Recording Service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5005")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// Show circuit breaker states
    Breakers,
    /// Force all circuit breakers closed
    ResetBreakers,
    /// Show bulkhead pool counters
    Bulkheads,
    /// Record one attendance event
    Record {
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        course_id: String,
        /// Date in YYYY-MM-DD form
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "present")]
        status: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Attendance summary for a student
    Summary {
        student_id: String,
        #[arg(long)]
        course_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Breakers => {
            let res = client
                .get(format!("{}/api/attendance/circuit-breakers", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ResetBreakers => {
            let res = client
                .post(format!("{}/api/attendance/circuit-breakers/reset", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Bulkheads => {
            let res = client
                .get(format!("{}/api/attendance/bulkheads", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Record {
            student_id,
            course_id,
            date,
            status,
            session,
        } => {
            let body = serde_json::json!({
                "student_id": student_id,
                "course_id": course_id,
                "date": date,
                "status": status,
                "session_name": session,
            });
            let res = client
                .post(format!("{}/api/attendance", cli.url))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Summary {
            student_id,
            course_id,
        } => {
            let mut request =
                client.get(format!("{}/api/attendance/student/{}", cli.url, student_id));
            if let Some(course) = course_id {
                request = request.query(&[("course_id", course)]);
            }
            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
