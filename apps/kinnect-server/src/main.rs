mod config;
mod email;
mod error;
mod handlers;
mod identity;
mod magic_link;
mod notify;
mod participant;
mod server;
mod sms;
mod templates;

#[cfg(test)]
mod tests;

use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kinnect_storage::{
    Account, AccountId, AccountRole, ContactEntryId, IntroductionId, PendingIntroduction,
    ReferralId, ReferralStatus, Store,
};
use kinnect_store_sqlite::SqliteStore;
use kinnect_template::{build_statement, StatementFields};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use handlers::accounts::Registration;
use handlers::auth::SignInOutcome;
use handlers::contacts::NewContact;
use handlers::introductions::{
    ContactDetails, IntroducedPerson, IntroductionDecision, IntroductionOutcome,
};
use handlers::referrals::{ReferralDecision, ReferralOutcome, ReferralTarget};
use handlers::DispatchOptions;
use notify::{ChannelFlags, DeliveryReport};
use participant::{Participant, Responder};
use server::KinnectServer;
use templates::TemplateOverride;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "kinnect-server")]
#[command(about = "Kinnect introduction and referral workflow administration")]
struct Cli {
    /// Database URL (sqlite://path/to/kinnect.db)
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://kinnect.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Account management
    Account {
        #[command(subcommand)]
        cmd: AccountCommand,
    },
    /// Contact book management
    Contact {
        #[command(subcommand)]
        cmd: ContactCommand,
    },
    /// Referee outreach to first-degree contacts
    Outreach {
        #[command(subcommand)]
        cmd: OutreachCommand,
    },
    /// Referral consent chain
    Referral {
        #[command(subcommand)]
        cmd: ReferralCommand,
    },
    /// Direct introductions
    Intro {
        #[command(subcommand)]
        cmd: IntroCommand,
    },
    /// Magic sign-in links
    Link {
        #[command(subcommand)]
        cmd: LinkCommand,
    },
    /// Notification inbox
    Notifications {
        /// Account id or email
        account: String,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Register a new account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        handle: Option<String>,
        #[arg(long, default_value = "referee")]
        role: AccountRole,
    },
    /// Show an account by id or email
    Show { account: String },
}

#[derive(Subcommand)]
enum ContactCommand {
    /// Add a contact book entry
    Add {
        /// Owning account id or email
        #[arg(long)]
        owner: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        organization: Option<String>,
    },
    /// List an account's contact book
    List {
        /// Owning account id or email
        owner: String,
    },
}

#[derive(Subcommand)]
enum OutreachCommand {
    /// Ask contacts to suggest introductions
    Send {
        /// Referee account id or email
        #[arg(long)]
        referee: String,
        /// Contact book entry ids
        #[arg(long = "contact", required = true)]
        contacts: Vec<ContactEntryId>,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
    /// Print the personal statement that would be sent
    Preview {
        #[command(flatten)]
        statement: StatementArgs,
    },
}

#[derive(Subcommand)]
enum ReferralCommand {
    /// Refer one or more people to a referee
    Submit {
        /// Referee account id or email
        #[arg(long)]
        referee: String,
        /// First-degree account id or email
        #[arg(long)]
        first_degree: String,
        /// Target as "Name,email[,phone]"
        #[arg(long = "target", required = true)]
        targets: Vec<TargetArg>,
        #[command(flatten)]
        dispatch: DispatchArgs,
    },
    /// Approve or deny a referral as its target
    Respond {
        id: ReferralId,
        #[arg(long, value_enum)]
        decision: ReferralDecisionArg,
        #[command(flatten)]
        responder: ResponderArgs,
    },
    /// List referrals in a status
    List {
        #[arg(long, default_value = "pending")]
        status: ReferralStatus,
    },
}

#[derive(Subcommand)]
enum IntroCommand {
    /// Introduce two people
    Create {
        /// Introducer account id or email
        #[arg(long)]
        introducer: String,
        #[arg(long)]
        a_name: String,
        #[arg(long)]
        a_email: String,
        #[arg(long)]
        a_company: Option<String>,
        #[arg(long)]
        b_name: String,
        #[arg(long)]
        b_email: String,
        #[arg(long)]
        b_company: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[command(flatten)]
        channels: ChannelArgs,
    },
    /// Show an introduction
    Show { id: IntroductionId },
    /// List introductions made by an introducer
    List {
        /// Introducer account id or email
        introducer: String,
    },
    /// Accept or decline an introduction as one of its parties
    Respond {
        id: IntroductionId,
        #[arg(long, value_enum)]
        decision: IntroductionDecisionArg,
        #[command(flatten)]
        responder: ResponderArgs,
        /// Name to register under if the responder has no account
        #[arg(long)]
        name: Option<String>,
        /// Phone to register if the responder has no account
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
enum LinkCommand {
    /// Issue a link for an account and print it
    Issue {
        /// Account id or email
        account: String,
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Email/SMS a sign-in link to an address
    Send {
        email: String,
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Redeem a token
    Redeem { token: String },
}

#[derive(Args)]
struct ChannelArgs {
    /// Do not send email
    #[arg(long)]
    no_email: bool,
    /// Do not send SMS
    #[arg(long)]
    no_sms: bool,
}

impl ChannelArgs {
    fn flags(&self) -> ChannelFlags {
        ChannelFlags {
            email: !self.no_email,
            sms: !self.no_sms,
        }
    }
}

#[derive(Args)]
struct StatementArgs {
    #[arg(long = "skill")]
    skills: Vec<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    achievement: Option<String>,
    #[arg(long)]
    achievement_method: Option<String>,
    #[arg(long)]
    intro_request: Option<String>,
}

impl StatementArgs {
    fn fields(&self) -> StatementFields {
        StatementFields {
            skills: self.skills.clone(),
            company: self.company.clone(),
            achievement: self.achievement.clone(),
            achievement_method: self.achievement_method.clone(),
            intro_request: self.intro_request.clone(),
        }
    }
}

#[derive(Args)]
struct DispatchArgs {
    /// Note included with the request
    #[arg(long)]
    message: Option<String>,
    /// Replace the subject for this dispatch
    #[arg(long)]
    subject: Option<String>,
    /// Replace the HTML body for this dispatch
    #[arg(long)]
    html: Option<String>,
    /// Replace the SMS text for this dispatch
    #[arg(long)]
    sms_text: Option<String>,
    #[command(flatten)]
    statement: StatementArgs,
    #[command(flatten)]
    channels: ChannelArgs,
}

impl DispatchArgs {
    fn options(&self) -> DispatchOptions {
        let over = TemplateOverride {
            subject: self.subject.clone(),
            html: self.html.clone(),
            sms: self.sms_text.clone(),
        };
        DispatchOptions {
            template_override: (over != TemplateOverride::default()).then_some(over),
            channels: self.channels.flags(),
            message: self.message.clone(),
            statement: self.statement.fields(),
        }
    }
}

#[derive(Args)]
struct ResponderArgs {
    /// Respond as this account id
    #[arg(long, conflicts_with = "as_email", required_unless_present = "as_email")]
    as_account: Option<AccountId>,
    /// Respond as the holder of this email
    #[arg(long)]
    as_email: Option<String>,
}

impl ResponderArgs {
    fn responder(&self) -> Responder {
        match (&self.as_account, &self.as_email) {
            (Some(id), _) => Responder::account(id.clone()),
            (None, Some(email)) => Responder::email(email.clone()),
            (None, None) => Responder::default(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReferralDecisionArg {
    Approve,
    Deny,
}

#[derive(Clone, Copy, ValueEnum)]
enum IntroductionDecisionArg {
    Accept,
    Decline,
}

#[derive(Clone, Debug)]
struct TargetArg(ReferralTarget);

impl FromStr for TargetArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [name, email] | [name, email, ""] => Ok(Self(ReferralTarget {
                name: name.to_string(),
                email: email.to_string(),
                phone: None,
            })),
            [name, email, phone] => Ok(Self(ReferralTarget {
                name: name.to_string(),
                email: email.to_string(),
                phone: Some(phone.to_string()),
            })),
            _ => Err(format!("expected \"Name,email[,phone]\", got {s:?}")),
        }
    }
}

// ────────────────────────────────────── CLI Commands ──────────────────────────────────────

type CmdResult = Result<(), Box<dyn std::error::Error>>;

async fn build_server(database_url: &str) -> Result<KinnectServer, Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(database_url).await?);
    Ok(KinnectServer::from_config(store, &config)?)
}

fn print_report(report: &DeliveryReport) {
    let delivered = report.deliveries.iter().filter(|d| d.delivered()).count();
    let failed: Vec<_> = report.deliveries.iter().filter(|d| d.failed()).collect();
    println!(
        "Notifications: {} sent, {} with delivery failures, {} not sent on any channel",
        delivered,
        failed.len(),
        report.len() - delivered
    );
    for d in failed {
        let to = d
            .receiver_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unregistered recipient".to_string());
        println!(
            "  ✗ {} to {}: email {:?}, sms {:?}",
            d.kind.as_str(),
            to,
            d.email,
            d.sms
        );
    }
}

fn print_account(account: &Account) {
    println!("ID:      {}", account.id);
    println!("Name:    {}", account.name);
    println!("Email:   {}", account.email.as_deref().unwrap_or("-"));
    println!("Phone:   {}", account.phone.as_deref().unwrap_or("-"));
    println!("Role:    {}", account.role.as_str());
    println!("Created: {}", account.created_at);
}

fn print_introduction(intro: &PendingIntroduction) {
    println!("ID:         {}", intro.id);
    println!("Introducer: {}", intro.introducer_id);
    println!("Status:     {}", intro.status());
    for (label, party) in [("Person A", &intro.person_a), ("Person B", &intro.person_b)] {
        let who = match Participant::from_party(party) {
            Participant::Known(id) => format!("account {}", id),
            Participant::EmailOnly(email) => format!("not registered ({})", email),
        };
        println!(
            "{}:   {} <{}> [{}] {}",
            label,
            party.name,
            party.email,
            party.decision.as_str(),
            who
        );
    }
    if let Some(note) = &intro.note {
        println!("Note:       {}", note);
    }
}

async fn cmd_account(server: &KinnectServer, cmd: AccountCommand) -> CmdResult {
    match cmd {
        AccountCommand::Create {
            name,
            email,
            phone,
            handle,
            role,
        } => {
            let account = handlers::accounts::register_account(
                server,
                Registration {
                    name,
                    email,
                    phone,
                    handle,
                    role,
                },
            )
            .await?;
            println!("✓ Account created\n");
            print_account(&account);
        }
        AccountCommand::Show { account } => {
            let account = handlers::accounts::find_account(server, &account).await?;
            print_account(&account);
        }
    }
    Ok(())
}

async fn cmd_contact(server: &KinnectServer, cmd: ContactCommand) -> CmdResult {
    match cmd {
        ContactCommand::Add {
            owner,
            name,
            email,
            phone,
            organization,
        } => {
            let owner = handlers::accounts::find_account(server, &owner).await?;
            let entry = handlers::contacts::add_contact(
                server,
                &owner.id,
                NewContact {
                    name,
                    email,
                    phone,
                    organization,
                },
            )
            .await?;
            println!("✓ Contact {} added", entry.id);
            if let Some(linked) = entry.linked_account_id {
                println!("Linked to account {}", linked);
            }
        }
        ContactCommand::List { owner } => {
            let owner = handlers::accounts::find_account(server, &owner).await?;
            let entries = handlers::contacts::list_contacts(server, &owner.id).await?;
            if entries.is_empty() {
                println!("No contacts found.");
            }
            for entry in entries {
                println!(
                    "{}  {}  {}  {}",
                    entry.id,
                    entry.name,
                    entry.email.as_deref().unwrap_or("-"),
                    entry
                        .linked_account_id
                        .map(|id| format!("linked:{}", id))
                        .unwrap_or_else(|| "unlinked".to_string())
                );
            }
        }
    }
    Ok(())
}

async fn cmd_outreach(server: &KinnectServer, cmd: OutreachCommand) -> CmdResult {
    match cmd {
        OutreachCommand::Send {
            referee,
            contacts,
            dispatch,
        } => {
            let referee = handlers::accounts::find_account(server, &referee).await?;
            let result = handlers::outreach::request_introductions(
                server,
                &referee.id,
                &contacts,
                &dispatch.options(),
            )
            .await?;
            for (entry_id, account_id) in &result.requested {
                println!("✓ Requested {} (account {})", entry_id, account_id);
            }
            for (entry_id, reason) in &result.skipped {
                println!("✗ Skipped {}: {:?}", entry_id, reason);
            }
            print_report(&result.report);
        }
        OutreachCommand::Preview { statement } => {
            println!("{}", build_statement(&statement.fields()));
        }
    }
    Ok(())
}

async fn cmd_referral(server: &KinnectServer, cmd: ReferralCommand) -> CmdResult {
    match cmd {
        ReferralCommand::Submit {
            referee,
            first_degree,
            targets,
            dispatch,
        } => {
            let referee = handlers::accounts::find_account(server, &referee).await?;
            let first_degree = handlers::accounts::find_account(server, &first_degree).await?;
            let targets: Vec<ReferralTarget> = targets.into_iter().map(|t| t.0).collect();
            let submitted = handlers::referrals::submit_referrals(
                server,
                &referee.id,
                &first_degree.id,
                &targets,
                &dispatch.options(),
            )
            .await?;
            for record in &submitted.referrals {
                println!("✓ Referral {} created", record.id);
            }
            print_report(&submitted.report);
        }
        ReferralCommand::Respond {
            id,
            decision,
            responder,
        } => {
            let decision = match decision {
                ReferralDecisionArg::Approve => ReferralDecision::Approve,
                ReferralDecisionArg::Deny => ReferralDecision::Deny,
            };
            let outcome = handlers::referrals::respond_to_referral(
                server,
                &id,
                &responder.responder(),
                decision,
            )
            .await?;
            match outcome {
                ReferralOutcome::Decided(record, report) => {
                    println!("✓ Referral {} is now {}", record.id, record.status.as_str());
                    print_report(&report);
                }
                ReferralOutcome::AlreadyResponded(status) => {
                    println!("Already responded: referral is {}", status.as_str());
                }
                ReferralOutcome::NotParticipant => {
                    println!("✗ Only the referred person can respond to this referral");
                }
            }
        }
        ReferralCommand::List { status } => {
            let records = handlers::referrals::list_referrals(server, status).await?;
            if records.is_empty() {
                println!("No {} referrals found.", status.as_str());
            }
            for r in records {
                println!(
                    "{}  referee:{}  via:{}  target:{}  {}",
                    r.id,
                    r.referee_id,
                    r.first_degree_id,
                    r.referral_id,
                    r.status.as_str()
                );
            }
        }
    }
    Ok(())
}

async fn cmd_intro(server: &KinnectServer, cmd: IntroCommand) -> CmdResult {
    match cmd {
        IntroCommand::Create {
            introducer,
            a_name,
            a_email,
            a_company,
            b_name,
            b_email,
            b_company,
            note,
            channels,
        } => {
            let introducer = handlers::accounts::find_account(server, &introducer).await?;
            let created = handlers::introductions::create_introduction(
                server,
                &introducer.id,
                &IntroducedPerson {
                    name: a_name,
                    email: a_email,
                    company: a_company,
                },
                &IntroducedPerson {
                    name: b_name,
                    email: b_email,
                    company: b_company,
                },
                note,
                channels.flags(),
            )
            .await?;
            println!("✓ Introduction created\n");
            print_introduction(&created.introduction);
            print_report(&created.report);
        }
        IntroCommand::Show { id } => {
            let intro = handlers::introductions::get_introduction(server, &id).await?;
            print_introduction(&intro);
        }
        IntroCommand::List { introducer } => {
            let introducer = handlers::accounts::find_account(server, &introducer).await?;
            let intros =
                handlers::introductions::list_introductions(server, &introducer.id).await?;
            if intros.is_empty() {
                println!("No introductions found.");
            }
            for intro in intros {
                println!(
                    "{}  {} <> {}  {}",
                    intro.id,
                    intro.person_a.name,
                    intro.person_b.name,
                    intro.status()
                );
            }
        }
        IntroCommand::Respond {
            id,
            decision,
            responder,
            name,
            phone,
        } => {
            let decision = match decision {
                IntroductionDecisionArg::Accept => IntroductionDecision::Accept,
                IntroductionDecisionArg::Decline => IntroductionDecision::Decline,
            };
            let details =
                (name.is_some() || phone.is_some()).then_some(ContactDetails { name, phone });
            let outcome = handlers::introductions::respond_to_introduction(
                server,
                &id,
                &responder.responder(),
                decision,
                details,
            )
            .await?;
            match outcome {
                IntroductionOutcome::Recorded(intro, report) => {
                    println!("✓ Decision recorded, introduction is {}", intro.status());
                    if let Some(report) = report {
                        print_report(&report);
                    }
                }
                IntroductionOutcome::AlreadyResponded(status) => {
                    println!("Already responded: introduction is {}", status);
                }
                IntroductionOutcome::NotParticipant => {
                    println!("✗ Only the introduced people can respond to this introduction");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_link(server: &KinnectServer, cmd: LinkCommand) -> CmdResult {
    match cmd {
        LinkCommand::Issue { account, redirect } => {
            let account = handlers::accounts::find_account(server, &account).await?;
            let link = magic_link::issue(
                server.store.as_ref(),
                &server.public_base_url,
                &account.id,
                redirect.as_deref(),
            )
            .await?;
            println!("{}", link.url);
            println!("Expires: {}", link.expires_at);
        }
        LinkCommand::Send { email, redirect } => {
            match handlers::auth::request_sign_in(server, &email, redirect.as_deref()).await? {
                Some(report) => print_report(&report),
                None => println!("No account uses that address."),
            }
        }
        LinkCommand::Redeem { token } => match handlers::auth::sign_in(server, &token).await? {
            SignInOutcome::SignedIn {
                account,
                redirect_path,
            } => {
                println!("✓ Signed in as {} ({})", account.name, account.id);
                if let Some(path) = redirect_path {
                    println!("Continue to: {}", path);
                }
            }
            SignInOutcome::Invalid => println!("✗ Invalid or expired link"),
        },
    }
    Ok(())
}

async fn cmd_notifications(server: &KinnectServer, account: &str) -> CmdResult {
    let account = handlers::accounts::find_account(server, account).await?;
    let records = handlers::notifications::list_notifications(server, &account.id).await?;
    if records.is_empty() {
        println!("No notifications.");
    }
    for n in records {
        let channel = |attempted: bool, sent: bool| match (attempted, sent) {
            (false, _) => "-",
            (true, true) => "sent",
            (true, false) => "failed",
        };
        println!(
            "{}  {}  {}  email:{} sms:{}  {}",
            n.created_at,
            n.kind.as_str(),
            n.subject,
            channel(n.email_attempted, n.email_sent_at.is_some()),
            channel(n.sms_attempted, n.sms_sent_at.is_some()),
            n.id
        );
    }
    Ok(())
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let server = build_server(&cli.database_url).await?;

    match cli.command {
        Command::Account { cmd } => cmd_account(&server, cmd).await?,
        Command::Contact { cmd } => cmd_contact(&server, cmd).await?,
        Command::Outreach { cmd } => cmd_outreach(&server, cmd).await?,
        Command::Referral { cmd } => cmd_referral(&server, cmd).await?,
        Command::Intro { cmd } => cmd_intro(&server, cmd).await?,
        Command::Link { cmd } => cmd_link(&server, cmd).await?,
        Command::Notifications { account } => cmd_notifications(&server, &account).await?,
    }

    Ok(())
}
