use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chatwire::cli::Args;
use chatwire::{AnsiMarkdown, ChatWidget, HttpTransport, KeyPress, TerminalView, WidgetHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "chatwire=debug"
    } else {
        "chatwire=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;

    println!("{}", "=".repeat(50).bright_blue());
    println!("{} {}", "Server:".bright_cyan(), config.base_url);
    println!("{} {}", "Session:".bright_cyan(), config.session_id);
    println!(
        "{}",
        "Type a message and press Enter. End a line with \\ to continue it, \
         send !! to stop the agent, Ctrl+D to quit."
            .dimmed()
    );
    println!("{}", "=".repeat(50).bright_blue());

    let transport = HttpTransport::new(&config);
    let mut widget = ChatWidget::new(config, transport, TerminalView::stdout(), AnsiMarkdown);
    let handle = widget.handle();
    widget.init();

    tokio::spawn(read_stdin(handle));
    widget.run().await;
    Ok(())
}

/// Feed stdin lines into the widget's input. A trailing backslash keeps
/// composing; any other line is submitted.
async fn read_stdin(handle: WidgetHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = String::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };

        match line.strip_suffix('\\') {
            Some(head) => {
                draft.push_str(head);
                draft.push('\n');
                if !handle.input(draft.clone()) {
                    return;
                }
            }
            None => {
                draft.push_str(&line);
                let submitted = handle.input(std::mem::take(&mut draft))
                    && handle.key(KeyPress::ctrl_enter());
                if !submitted {
                    return;
                }
            }
        }
    }

    handle.shutdown();
}
