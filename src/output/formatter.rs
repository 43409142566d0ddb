use super::*;
use crate::github::Leaderboard;
use crate::registry::AccountMap;

pub const NO_DATA: &str = "No contribution data available.";
pub const NO_ACCOUNTS: &str = "No accounts linked yet.";
pub const DAILY_HEADER: &str = "Gathered commit stats of the day!";

/// Discord snowflakes render as user mentions; handles are shown verbatim.
pub fn mention(identity: &str) -> String {
    if !identity.is_empty() && identity.bytes().all(|b| b.is_ascii_digit()) {
        format!("<@{}>", identity)
    } else {
        identity.to_string()
    }
}

/// Ranks by contributions, highest first. Equal counts keep their input order.
pub fn rank(entries: &[ReportEntry]) -> Vec<&ReportEntry> {
    let mut ranked: Vec<_> = entries.iter().collect();
    ranked.sort_by(|a, b| b.contributions.cmp(&a.contributions));
    ranked
}

pub fn format_report(entries: &[ReportEntry]) -> String {
    if entries.is_empty() {
        return NO_DATA.to_string();
    }

    rank(entries)
        .into_iter()
        .map(|e| format!("{}: {} contributions", e.name, e.contributions))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ranked report with the last known commit time appended where available.
pub fn format_detailed_report(entries: &[ReportEntry]) -> String {
    if entries.is_empty() {
        return NO_DATA.to_string();
    }

    rank(entries)
        .into_iter()
        .map(|e| match &e.last_commit {
            Some(at) => format!(
                "{}: {} contributions (last commit {} UTC)",
                e.name, e.contributions, at
            ),
            None => format!("{}: {} contributions", e.name, e.contributions),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn daily_summary(entries: &[ReportEntry]) -> String {
    format!("{}\n\n{}", DAILY_HEADER, format_detailed_report(entries))
}

pub fn format_accounts(accounts: &AccountMap) -> String {
    if accounts.is_empty() {
        return NO_ACCOUNTS.to_string();
    }

    let lines: Vec<_> = accounts
        .iter()
        .map(|(identity, account)| format!("{}: {}", mention(identity), account))
        .collect();
    format!("Linked accounts:\n{}", lines.join("\n"))
}

pub fn linked_message(identity: &str, account: &str) -> String {
    format!("Account \"{}\" has been linked to {}", account, mention(identity))
}

pub fn unlinked_message(identity: &str) -> String {
    format!("Account has been unlinked from {}", mention(identity))
}

/// Pairs each fetched account with the chat identity it is linked to. GitHub
/// returns the canonical login, so the lookup ignores case.
pub fn entries_for(leaderboard: &Leaderboard, accounts: &AccountMap) -> Vec<ReportEntry> {
    let counts = leaderboard.contributions();
    let mut activity = leaderboard.last_commits();

    leaderboard
        .accounts()
        .map(|account| {
            let name = accounts
                .iter()
                .find(|(_, linked)| linked.eq_ignore_ascii_case(account))
                .map(|(identity, _)| mention(identity))
                .unwrap_or_else(|| account.to_string());
            let (last_active_date, last_commit) = activity.remove(account).unwrap_or_default();

            ReportEntry {
                name,
                account: account.to_string(),
                contributions: counts.get(account).copied().unwrap_or_default(),
                last_active_date,
                last_commit,
            }
        })
        .collect()
}

pub fn embed(title: &str, description: &str, color: u32) -> Embed {
    Embed {
        title: title.to_string(),
        description: truncate_message(description, EMBED_DESCRIPTION_LIMIT),
        color,
    }
}

pub const MESSAGE_LIMIT: usize = 2000;
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

/// Cuts `text` to at most `limit` characters, preferring a line boundary.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let budget = limit.saturating_sub(1);
    let cut: String = text.chars().take(budget).collect();
    let cut = match cut.rfind('\n') {
        Some(idx) if idx > 0 => cut[..idx].to_string(),
        _ => cut,
    };
    format!("{}…", cut)
}
