//! # timesheet
//!
//! A terminal client for the team timesheet service. One-shot commands cover
//! the weekly timesheet, the day planner, leave requests, attendance, projects
//! and shifts; `timesheet ui` opens an interactive planner board.
//!
//! ## Setup
//!
//! ```bash
//! export TIMESHEET_API_URL=https://example.org/timesheet/api
//! export TIMESHEET_API_KEY=...
//! timesheet login --email me@example.org
//! ```
//!
//! The task board (`timesheet board ...`) talks to the hosted backend and
//! needs `TIMESHEET_REMOTE_URL` and `TIMESHEET_REMOTE_KEY`.
//!
//! ## Usage
//!
//! ```bash
//! # This week's grid, or two weeks back
//! timesheet week
//! timesheet week --offset -2
//!
//! # Log 1h30 on a task
//! timesheet log <TASK> 2024-06-12 --hours 1 --minutes 30
//!
//! # Plan today
//! timesheet plan show
//! timesheet plan add <TASK>
//! timesheet plan hours <TASK> 3
//!
//! # Apply for leave
//! timesheet leave apply --category LEAVE --type CL --from 2024-07-01 --message "Family trip"
//!
//! # Board projects over the next two weeks, then one project's open work
//! timesheet board timeline
//! timesheet board project <PROJECT> --status in_progress
//! ```
//!
//! ### Planner board (TUI)
//!
//! *   `j`/`k` or arrows: Move
//! *   `Tab`: Switch between Allocated, Planned and Actual
//! *   `Enter`/`p`: Plan the selected allocated task
//! *   `d`: Remove the selected planned task
//! *   `h`: Edit planned hours
//! *   `[` / `]`: Previous / next day, `t`: Today
//! *   `q`: Quit
//!
//! ## Data Storage
//!
//! The session, the entries mirror and `config.toml` live in the local data
//! directory (`~/.local/share/timesheet` on Linux). Override it with
//! `TIMESHEET_HOME`. Logs go to stderr, filtered by `RUST_LOG`; the TUI logs
//! to `timesheet.log` in the same directory.

use std::fs::{self, OpenOptions};
use std::io;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use timesheet::commands::{self, *};
use timesheet::config::AppConfig;
use timesheet::errors::Result;
use timesheet::tui::run_tui;

#[derive(Parser)]
#[command(name = "timesheet")]
#[command(about = "Terminal client for timesheets, planning and leave", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupArg {
    Status,
    Project,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with your work email
    Login {
        #[arg(short, long)]
        email: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Check whether your role may use a feature
    Can {
        feature: String,
    },
    /// Show the weekly timesheet
    Week {
        /// Weeks relative to this one, e.g. -1 for last week
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        /// Print the cached entries without calling the API
        #[arg(long)]
        offline: bool,
    },
    /// Log time on a task for a day
    Log {
        task: String,
        /// Date in YYYY-MM-DD
        date: String,
        #[arg(short = 'H', long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=24))]
        hours: u32,
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..60))]
        minutes: u32,
        /// Allocated hours, defaults to the logged time
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=24))]
        allocated: Option<u32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..60))]
        allocated_minutes: Option<u32>,
    },
    /// List tasks assigned to you
    Tasks {
        #[arg(long, value_enum, default_value_t = GroupArg::Status)]
        by: GroupArg,
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Kanban board on the hosted backend
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
    /// Plan your day
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Leave, work from home and permission requests
    Leave {
        #[command(subcommand)]
        command: LeaveCommands,
    },
    /// Monthly attendance
    Attendance {
        /// Month in YYYY-MM
        #[arg(short, long)]
        month: Option<String>,
        /// Employee id (leads and managers)
        #[arg(short, long)]
        employee: Option<String>,
        #[arg(short, long)]
        team: Option<String>,
    },
    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage clients
    Clients {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Manage buckets
    Buckets {
        #[command(subcommand)]
        command: BucketCommands,
    },
    /// Show shifts and who works them
    Shifts {
        #[arg(short, long)]
        team: Option<String>,
    },
    /// Two-week workload and availability
    Workload {
        /// Weeks relative to the current fortnight
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
    /// Open the interactive planner board
    Ui,
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BoardCommands {
    /// Show the board columns
    Show,
    /// Move a task to another column
    Move {
        task: String,
        /// TODO, IN_PROGRESS, REVIEW or COMPLETED
        column: String,
    },
    /// Create a task in To Do
    Add {
        title: String,
        /// Board project id or name
        #[arg(short, long)]
        project: Option<String>,
        /// Due date in YYYY-MM-DD
        #[arg(short, long)]
        due: Option<String>,
        #[arg(short = 'H', long)]
        hours: Option<f64>,
    },
    /// Delete a task
    Delete {
        task: String,
    },
    /// Two-week project timeline with task counts
    Timeline {
        /// Windows to move, negative for earlier
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
    },
    /// Tasks of one board project
    Project {
        id: String,
        /// Only tasks with this status (case-insensitive), or "all"
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Sign in to the hosted backend
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign out of the hosted backend
    Logout,
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Show allocated, planned and actual tasks
    Show {
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Plan an allocated task
    Add {
        task: String,
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Remove a task from the plan
    Remove {
        task: String,
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Change the planned hours of a task
    Hours {
        task: String,
        hours: String,
        #[arg(short, long)]
        date: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum LeaveCommands {
    /// Submit a request
    Apply {
        /// LEAVE, WFH or PERMISSION
        #[arg(short, long, default_value = "LEAVE")]
        category: String,
        /// Request type, e.g. CL, SL, EL, UPL
        #[arg(short = 'T', long = "type")]
        req_type: Option<String>,
        /// First day in YYYY-MM-DD
        #[arg(short, long)]
        from: String,
        /// Last day in YYYY-MM-DD, defaults to --from
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        first_half: bool,
        #[arg(long)]
        second_half: bool,
        /// Approver id or email; repeatable. Defaults to everyone in your hierarchy
        #[arg(long = "mail-to")]
        mail_to: Vec<String>,
        #[arg(short, long)]
        message: String,
        /// Flag the request as lacking prior notice
        #[arg(long)]
        no_notice: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Past requests
    History,
    /// Leave balance
    Balance,
    /// Official holidays
    Holidays,
}

#[derive(Subcommand)]
enum ProjectCommands {
    List,
    Search {
        term: String,
    },
    Create {
        name: String,
        /// Client id or name; repeatable
        #[arg(long = "client")]
        clients: Vec<String>,
        /// Participant id or email; repeatable
        #[arg(long = "participant")]
        participants: Vec<String>,
        #[arg(long = "incharge")]
        incharge: Vec<String>,
        #[arg(long = "owner")]
        owners: Vec<String>,
        /// Disable time entry for the project
        #[arg(long)]
        no_time_entry: bool,
    },
    Update {
        /// Project id or name
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "client")]
        clients: Vec<String>,
        #[arg(long = "participant")]
        participants: Vec<String>,
        #[arg(long = "incharge")]
        incharge: Vec<String>,
        #[arg(long = "owner")]
        owners: Vec<String>,
        #[arg(long)]
        time_entry: Option<bool>,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    List,
    Add { name: String },
}

#[derive(Subcommand)]
enum BucketCommands {
    List,
    /// Attach buckets to a project
    Attach {
        /// Project id or name
        project: String,
        /// Bucket ids or names
        #[arg(required = true)]
        buckets: Vec<String>,
    },
}

fn init_tracing(config: &AppConfig, to_file: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if to_file {
        let path = config.data_dir.join("timesheet.log");
        let file = fs::create_dir_all(&config.data_dir)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
        if let Ok(file) = file {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            return;
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run(cli: Cli, ctx: &Context) -> Result<()> {
    match cli.command {
        Commands::Login { email } => cmd_login(ctx, &email),
        Commands::Logout => cmd_logout(ctx),
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Can { feature } => cmd_can(ctx, &feature),
        Commands::Week { offset, offline } => cmd_week(ctx, offset, offline),
        Commands::Log { task, date, hours, minutes, allocated, allocated_minutes } => {
            cmd_log(ctx, LogArgs { task, date, hours, minutes, allocated, allocated_minutes })
        }
        Commands::Tasks { by, all } => {
            let by = match by {
                GroupArg::Status => GroupBy::Status,
                GroupArg::Project => GroupBy::Project,
            };
            cmd_tasks(ctx, by, all)
        }
        Commands::Board { command } => match command {
            BoardCommands::Show => cmd_board_show(ctx),
            BoardCommands::Move { task, column } => cmd_board_move(ctx, &task, &column),
            BoardCommands::Add { title, project, due, hours } => {
                cmd_board_add(ctx, &title, project.as_deref(), due.as_deref(), hours)
            }
            BoardCommands::Delete { task } => cmd_board_delete(ctx, &task),
            BoardCommands::Timeline { offset } => cmd_board_timeline(ctx, offset),
            BoardCommands::Project { id, status } => cmd_board_project(ctx, &id, status.as_deref()),
            BoardCommands::Login { email, password } => cmd_board_login(ctx, &email, &password),
            BoardCommands::Logout => cmd_board_logout(ctx),
        },
        Commands::Plan { command } => match command {
            PlanCommands::Show { date } => cmd_plan_show(ctx, date.as_deref()),
            PlanCommands::Add { task, date } => cmd_plan_add(ctx, &task, date.as_deref()),
            PlanCommands::Remove { task, date } => cmd_plan_remove(ctx, &task, date.as_deref()),
            PlanCommands::Hours { task, hours, date, yes } => cmd_plan_hours(ctx, &task, &hours, date.as_deref(), yes),
        },
        Commands::Leave { command } => match command {
            LeaveCommands::Apply {
                category,
                req_type,
                from,
                to,
                first_half,
                second_half,
                mail_to,
                message,
                no_notice,
                yes,
            } => cmd_leave_apply(
                ctx,
                LeaveApplyArgs { category, req_type, from, to, first_half, second_half, mail_to, message, no_notice, yes },
            ),
            LeaveCommands::History => cmd_leave_history(ctx),
            LeaveCommands::Balance => cmd_leave_balance(ctx),
            LeaveCommands::Holidays => cmd_leave_holidays(ctx),
        },
        Commands::Attendance { month, employee, team } => cmd_attendance(ctx, month.as_deref(), employee, team),
        Commands::Projects { command } => match command {
            ProjectCommands::List => cmd_projects_list(ctx),
            ProjectCommands::Search { term } => cmd_projects_search(ctx, &term),
            ProjectCommands::Create { name, clients, participants, incharge, owners, no_time_entry } => {
                let args = ProjectArgs {
                    name: Some(name),
                    clients,
                    participants,
                    incharge,
                    owners,
                    time_entry: Some(!no_time_entry),
                };
                cmd_projects_create(ctx, args)
            }
            ProjectCommands::Update { project, name, clients, participants, incharge, owners, time_entry } => {
                let args = ProjectArgs { name, clients, participants, incharge, owners, time_entry };
                cmd_projects_update(ctx, &project, args)
            }
        },
        Commands::Clients { command } => match command {
            ClientCommands::List => cmd_clients_list(ctx),
            ClientCommands::Add { name } => cmd_clients_add(ctx, &name),
        },
        Commands::Buckets { command } => match command {
            BucketCommands::List => cmd_buckets_list(ctx),
            BucketCommands::Attach { project, buckets } => cmd_buckets_attach(ctx, &project, &buckets),
        },
        Commands::Shifts { team } => cmd_shifts(ctx, team),
        Commands::Workload { offset } => cmd_workload(ctx, offset),
        Commands::Ui => run_tui(ctx),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "timesheet", &mut io::stdout());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = AppConfig::load().and_then(|config| {
        init_tracing(&config, matches!(cli.command, Commands::Ui));
        let ctx = commands::Context::new(config)?;
        run(cli, &ctx)
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_hours_are_bounded() {
        assert!(Cli::try_parse_from(["timesheet", "log", "t1", "2024-06-12", "--hours", "8"]).is_ok());
        assert!(Cli::try_parse_from(["timesheet", "log", "t1", "2024-06-12", "--hours", "4294967295"]).is_err());
        assert!(Cli::try_parse_from(["timesheet", "log", "t1", "2024-06-12", "--minutes", "60"]).is_err());
    }
}
