//! SQLite implementation of the kinnect [`Store`].
//!
//! Conditional state updates are single `UPDATE ... WHERE <guard> RETURNING`
//! statements, so the guard check and the write cannot interleave with a
//! concurrent decision on the same row.

use chrono::{DateTime, Utc};
use kinnect_storage::*;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, StoreError> {
    s.as_deref().map(parse_uuid).transpose()
}

fn parse_enum<T: std::str::FromStr>(s: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| StoreError::Backend(e.to_string()))
}

// ──────────────────────────────── Row mapping ────────────────────────────────

const ACCOUNT_COLS: &str = "id, name, email, phone, handle, role, created_at, updated_at";

#[derive(FromRow)]
struct AccountRow {
    id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    handle: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId(parse_uuid(&row.id)?),
            name: row.name,
            email: row.email,
            phone: row.phone,
            handle: row.handle,
            role: parse_enum(&row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const CONTACT_COLS: &str = "id, owner_id, linked_account_id, name, email, phone, organization, \
                            last_requested_at, created_at";

#[derive(FromRow)]
struct ContactRow {
    id: String,
    owner_id: String,
    linked_account_id: Option<String>,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    organization: Option<String>,
    last_requested_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for ContactBookEntry {
    type Error = StoreError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(ContactBookEntry {
            id: ContactEntryId(parse_uuid(&row.id)?),
            owner_id: AccountId(parse_uuid(&row.owner_id)?),
            linked_account_id: parse_opt_uuid(row.linked_account_id)?.map(AccountId),
            name: row.name,
            email: row.email,
            phone: row.phone,
            organization: row.organization,
            last_requested_at: row.last_requested_at,
            created_at: row.created_at,
        })
    }
}

const REFERRAL_COLS: &str =
    "id, referee_id, first_degree_id, referral_id, status, created_at, decided_at";

#[derive(FromRow)]
struct ReferralRow {
    id: String,
    referee_id: String,
    first_degree_id: String,
    referral_id: String,
    status: String,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReferralRow> for ReferralRecord {
    type Error = StoreError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(ReferralRecord {
            id: ReferralId(parse_uuid(&row.id)?),
            referee_id: AccountId(parse_uuid(&row.referee_id)?),
            first_degree_id: AccountId(parse_uuid(&row.first_degree_id)?),
            referral_id: AccountId(parse_uuid(&row.referral_id)?),
            status: parse_enum(&row.status)?,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

const INTRODUCTION_COLS: &str = "id, introducer_id, \
     person_a_name, person_a_email, person_a_company, person_a_account_id, person_a_decision, \
     person_b_name, person_b_email, person_b_company, person_b_account_id, person_b_decision, \
     note, created_at, updated_at";

#[derive(FromRow)]
struct IntroductionRow {
    id: String,
    introducer_id: String,
    person_a_name: String,
    person_a_email: String,
    person_a_company: Option<String>,
    person_a_account_id: Option<String>,
    person_a_decision: String,
    person_b_name: String,
    person_b_email: String,
    person_b_company: Option<String>,
    person_b_account_id: Option<String>,
    person_b_decision: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntroductionRow> for PendingIntroduction {
    type Error = StoreError;

    fn try_from(row: IntroductionRow) -> Result<Self, Self::Error> {
        Ok(PendingIntroduction {
            id: IntroductionId(parse_uuid(&row.id)?),
            introducer_id: AccountId(parse_uuid(&row.introducer_id)?),
            person_a: IntroductionParty {
                name: row.person_a_name,
                email: row.person_a_email,
                company: row.person_a_company,
                account_id: parse_opt_uuid(row.person_a_account_id)?.map(AccountId),
                decision: parse_enum(&row.person_a_decision)?,
            },
            person_b: IntroductionParty {
                name: row.person_b_name,
                email: row.person_b_email,
                company: row.person_b_company,
                account_id: parse_opt_uuid(row.person_b_account_id)?.map(AccountId),
                decision: parse_enum(&row.person_b_decision)?,
            },
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const NOTIFICATION_COLS: &str = "id, sender_id, receiver_id, kind, subject, body, \
     email_attempted, sms_attempted, email_sent_at, sms_sent_at, created_at";

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    sender_id: Option<String>,
    receiver_id: String,
    kind: String,
    subject: String,
    body: String,
    email_attempted: bool,
    sms_attempted: bool,
    email_sent_at: Option<DateTime<Utc>>,
    sms_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationRecord {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(NotificationRecord {
            id: NotificationId(parse_uuid(&row.id)?),
            sender_id: parse_opt_uuid(row.sender_id)?.map(AccountId),
            receiver_id: AccountId(parse_uuid(&row.receiver_id)?),
            kind: parse_enum(&row.kind)?,
            subject: row.subject,
            body: row.body,
            email_attempted: row.email_attempted,
            sms_attempted: row.sms_attempted,
            email_sent_at: row.email_sent_at,
            sms_sent_at: row.sms_sent_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct MagicLinkRow {
    account_id: String,
    token_hash: String,
    redirect_path: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MagicLinkRow> for MagicLinkToken {
    type Error = StoreError;

    fn try_from(row: MagicLinkRow) -> Result<Self, Self::Error> {
        Ok(MagicLinkToken {
            account_id: AccountId(parse_uuid(&row.account_id)?),
            token_hash: row.token_hash,
            redirect_path: row.redirect_path,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Accounts ─────────────────────────────

    async fn create_account(&self, params: &CreateAccountParams) -> Result<Account, StoreError> {
        let id = AccountId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO accounts(id, name, email, phone, handle, role, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(&params.name)
        .bind(&params.email)
        .bind(&params.phone)
        .bind(&params.handle)
        .bind(params.role.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(Account {
            id,
            name: params.name.clone(),
            email: params.email.clone(),
            phone: params.phone.clone(),
            handle: params.handle.clone(),
            role: params.role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_account(&self, account_id: &AccountId) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id = ?");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE email = ?");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn get_account_by_phone(&self, phone: &str) -> Result<Account, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE phone = ?");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn claim_account(
        &self,
        account_id: &AccountId,
        params: &ClaimAccountParams,
    ) -> Result<Transition<Account>, StoreError> {
        let sql = format!(
            "UPDATE accounts
                SET name = ?, email = COALESCE(email, ?), phone = COALESCE(phone, ?),
                    handle = ?, role = ?, updated_at = ?
              WHERE id = ? AND role = 'unregistered'
              RETURNING {ACCOUNT_COLS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(&params.name)
            .bind(&params.email)
            .bind(&params.phone)
            .bind(&params.handle)
            .bind(params.role.as_str())
            .bind(Utc::now())
            .bind(account_id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_err)?;

        match row {
            Some(row) => Ok(Transition::Applied(row.try_into()?)),
            None => Ok(Transition::Unchanged(self.get_account(account_id).await?)),
        }
    }

    // ──────────────────────────── Contact Book ────────────────────────────

    async fn create_contact_entry(
        &self,
        params: &CreateContactParams,
    ) -> Result<ContactBookEntry, StoreError> {
        let id = ContactEntryId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO contact_entries(id, owner_id, linked_account_id, name, email, phone,
                                         organization, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.owner_id.0.to_string())
        .bind(params.linked_account_id.as_ref().map(|a| a.0.to_string()))
        .bind(&params.name)
        .bind(&params.email)
        .bind(&params.phone)
        .bind(&params.organization)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(ContactBookEntry {
            id,
            owner_id: params.owner_id.clone(),
            linked_account_id: params.linked_account_id.clone(),
            name: params.name.clone(),
            email: params.email.clone(),
            phone: params.phone.clone(),
            organization: params.organization.clone(),
            last_requested_at: None,
            created_at: now,
        })
    }

    async fn get_contact_entry(&self, id: &ContactEntryId) -> Result<ContactBookEntry, StoreError> {
        let sql = format!("SELECT {CONTACT_COLS} FROM contact_entries WHERE id = ?");
        sqlx::query_as::<_, ContactRow>(&sql)
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_contact_entries(
        &self,
        owner_id: &AccountId,
    ) -> Result<Vec<ContactBookEntry>, StoreError> {
        let sql =
            format!("SELECT {CONTACT_COLS} FROM contact_entries WHERE owner_id = ? ORDER BY name");
        sqlx::query_as::<_, ContactRow>(&sql)
            .bind(owner_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(ContactBookEntry::try_from)
            .collect()
    }

    async fn link_contact_entries(&self, account: &Account) -> Result<u64, StoreError> {
        if !account.is_addressable() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE contact_entries SET linked_account_id = ?
              WHERE linked_account_id IS NULL
                AND ((? IS NOT NULL AND email = ?) OR (? IS NOT NULL AND phone = ?))",
        )
        .bind(account.id.0.to_string())
        .bind(&account.email)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.phone)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected())
    }

    async fn mark_contact_requested(
        &self,
        id: &ContactEntryId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE contact_entries SET last_requested_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    // ───────────────────────────── Referrals ─────────────────────────────

    async fn create_referral(
        &self,
        params: &CreateReferralParams,
    ) -> Result<ReferralRecord, StoreError> {
        let id = ReferralId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO referrals(id, referee_id, first_degree_id, referral_id, status, created_at)
             VALUES(?, ?, ?, ?, 'pending', ?)",
        )
        .bind(id.0.to_string())
        .bind(params.referee_id.0.to_string())
        .bind(params.first_degree_id.0.to_string())
        .bind(params.referral_id.0.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(ReferralRecord {
            id,
            referee_id: params.referee_id.clone(),
            first_degree_id: params.first_degree_id.clone(),
            referral_id: params.referral_id.clone(),
            status: ReferralStatus::Pending,
            created_at: now,
            decided_at: None,
        })
    }

    async fn get_referral(&self, id: &ReferralId) -> Result<ReferralRecord, StoreError> {
        let sql = format!("SELECT {REFERRAL_COLS} FROM referrals WHERE id = ?");
        sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_referrals_by_status(
        &self,
        status: ReferralStatus,
    ) -> Result<Vec<ReferralRecord>, StoreError> {
        let sql =
            format!("SELECT {REFERRAL_COLS} FROM referrals WHERE status = ? ORDER BY created_at");
        sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(ReferralRecord::try_from)
            .collect()
    }

    async fn decide_referral(
        &self,
        id: &ReferralId,
        status: ReferralStatus,
        at: DateTime<Utc>,
    ) -> Result<Transition<ReferralRecord>, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Conflict);
        }
        let sql = format!(
            "UPDATE referrals SET status = ?, decided_at = ?
              WHERE id = ? AND status = 'pending'
              RETURNING {REFERRAL_COLS}"
        );
        let row = sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(status.as_str())
            .bind(at)
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => Ok(Transition::Applied(row.try_into()?)),
            None => Ok(Transition::Unchanged(self.get_referral(id).await?)),
        }
    }

    // ──────────────────────────── Introductions ───────────────────────────

    async fn create_introduction(
        &self,
        params: &CreateIntroductionParams,
    ) -> Result<PendingIntroduction, StoreError> {
        let id = IntroductionId::new();
        let now = Utc::now();
        let a = &params.person_a;
        let b = &params.person_b;
        sqlx::query(
            "INSERT INTO introductions(id, introducer_id,
                 person_a_name, person_a_email, person_a_company, person_a_account_id,
                 person_b_name, person_b_email, person_b_company, person_b_account_id,
                 note, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.introducer_id.0.to_string())
        .bind(&a.name)
        .bind(&a.email)
        .bind(&a.company)
        .bind(a.account_id.as_ref().map(|x| x.0.to_string()))
        .bind(&b.name)
        .bind(&b.email)
        .bind(&b.company)
        .bind(b.account_id.as_ref().map(|x| x.0.to_string()))
        .bind(&params.note)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        let party = |p: &IntroductionPartyParams| IntroductionParty {
            name: p.name.clone(),
            email: p.email.clone(),
            company: p.company.clone(),
            account_id: p.account_id.clone(),
            decision: SideDecision::Undecided,
        };

        Ok(PendingIntroduction {
            id,
            introducer_id: params.introducer_id.clone(),
            person_a: party(a),
            person_b: party(b),
            note: params.note.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_introduction(
        &self,
        id: &IntroductionId,
    ) -> Result<PendingIntroduction, StoreError> {
        let sql = format!("SELECT {INTRODUCTION_COLS} FROM introductions WHERE id = ?");
        sqlx::query_as::<_, IntroductionRow>(&sql)
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_introductions_by_introducer(
        &self,
        introducer_id: &AccountId,
    ) -> Result<Vec<PendingIntroduction>, StoreError> {
        let sql = format!(
            "SELECT {INTRODUCTION_COLS} FROM introductions
              WHERE introducer_id = ? ORDER BY rowid DESC"
        );
        sqlx::query_as::<_, IntroductionRow>(&sql)
            .bind(introducer_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(PendingIntroduction::try_from)
            .collect()
    }

    async fn link_introduction_party(
        &self,
        id: &IntroductionId,
        side: IntroductionSide,
        account_id: &AccountId,
    ) -> Result<bool, StoreError> {
        let col = side.as_str();
        let sql = format!(
            "UPDATE introductions SET {col}_account_id = ?, updated_at = ?
              WHERE id = ? AND {col}_account_id IS NULL"
        );
        let result = sqlx::query(&sql)
            .bind(account_id.0.to_string())
            .bind(Utc::now())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_introduction_decision(
        &self,
        id: &IntroductionId,
        side: IntroductionSide,
        decision: SideDecision,
    ) -> Result<Transition<PendingIntroduction>, StoreError> {
        if decision == SideDecision::Undecided {
            return Err(StoreError::Conflict);
        }
        let col = side.as_str();
        let other = side.other().as_str();
        let sql = format!(
            "UPDATE introductions SET {col}_decision = ?, updated_at = ?
              WHERE id = ? AND {col}_decision = 'undecided' AND {other}_decision != 'declined'
              RETURNING {INTRODUCTION_COLS}"
        );
        let row = sqlx::query_as::<_, IntroductionRow>(&sql)
            .bind(decision.as_str())
            .bind(Utc::now())
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => Ok(Transition::Applied(row.try_into()?)),
            None => Ok(Transition::Unchanged(self.get_introduction(id).await?)),
        }
    }

    // ──────────────────────────── Notifications ───────────────────────────

    async fn create_notification(
        &self,
        params: &CreateNotificationParams,
    ) -> Result<NotificationRecord, StoreError> {
        let id = NotificationId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO notifications(id, sender_id, receiver_id, kind, subject, body,
                                       email_attempted, sms_attempted, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0.to_string())
        .bind(params.sender_id.as_ref().map(|a| a.0.to_string()))
        .bind(params.receiver_id.0.to_string())
        .bind(params.kind.as_str())
        .bind(&params.subject)
        .bind(&params.body)
        .bind(params.email_attempted)
        .bind(params.sms_attempted)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(NotificationRecord {
            id,
            sender_id: params.sender_id.clone(),
            receiver_id: params.receiver_id.clone(),
            kind: params.kind,
            subject: params.subject.clone(),
            body: params.body.clone(),
            email_attempted: params.email_attempted,
            sms_attempted: params.sms_attempted,
            email_sent_at: None,
            sms_sent_at: None,
            created_at: now,
        })
    }

    async fn mark_notification_sent(
        &self,
        id: &NotificationId,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sql = match channel {
            Channel::Email => "UPDATE notifications SET email_sent_at = ? WHERE id = ?",
            Channel::Sms => "UPDATE notifications SET sms_sent_at = ? WHERE id = ?",
        };
        let result = sqlx::query(sql)
            .bind(at)
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn list_notifications(
        &self,
        receiver_id: &AccountId,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLS} FROM notifications
              WHERE receiver_id = ? ORDER BY rowid DESC"
        );
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(receiver_id.0.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(NotificationRecord::try_from)
            .collect()
    }

    // ───────────────────────────── Magic Links ────────────────────────────

    async fn upsert_magic_link(&self, params: &UpsertMagicLinkParams) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO magic_links(account_id, token_hash, redirect_path, expires_at, created_at)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(account_id) DO UPDATE SET
                 token_hash = excluded.token_hash,
                 redirect_path = excluded.redirect_path,
                 expires_at = excluded.expires_at,
                 created_at = excluded.created_at",
        )
        .bind(params.account_id.0.to_string())
        .bind(&params.token_hash)
        .bind(&params.redirect_path)
        .bind(params.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        Ok(())
    }

    async fn take_magic_link(&self, token_hash: &str) -> Result<MagicLinkToken, StoreError> {
        sqlx::query_as::<_, MagicLinkRow>(
            "DELETE FROM magic_links WHERE token_hash = ?
             RETURNING account_id, token_hash, redirect_path, expires_at, created_at",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }
}
