//! Roster seeding
//!
//! Fills an empty ledger from the configured roster, or generates a demo
//! roster when none is configured.

use super::error::LedgerError;
use super::records::Account;
use super::store::LedgerStore;
use crate::core::{AccountId, Instrument, InstrumentId, HISTORY_CAPACITY};
use crate::infrastructure::config::{LedgerConfig, RosterConfig};
use rand::Rng;

/// Names used by the generated demo roster, cycled with a suffix past the end
const DEMO_ROSTER: &[(&str, &str, &str)] = &[
    ("LeBron James", "LAL", "F"),
    ("Stephen Curry", "GSW", "G"),
    ("Kevin Durant", "PHX", "F"),
    ("Giannis Antetokounmpo", "MIL", "F"),
    ("Nikola Jokic", "DEN", "C"),
    ("Luka Doncic", "DAL", "G"),
    ("Jayson Tatum", "BOS", "F"),
    ("Joel Embiid", "PHI", "C"),
    ("Shai Gilgeous-Alexander", "OKC", "G"),
    ("Anthony Edwards", "MIN", "G"),
    ("Devin Booker", "PHX", "G"),
    ("Jimmy Butler", "MIA", "F"),
    ("Anthony Davis", "LAL", "F-C"),
    ("Kawhi Leonard", "LAC", "F"),
    ("Donovan Mitchell", "CLE", "G"),
    ("Ja Morant", "MEM", "G"),
    ("Trae Young", "ATL", "G"),
    ("Victor Wembanyama", "SAS", "C"),
    ("Tyrese Haliburton", "IND", "G"),
    ("Domantas Sabonis", "SAC", "F-C"),
];

const DEMO_BASE_PRICE: std::ops::Range<f64> = 50.0..200.0;
const DEMO_SPREAD: f64 = 10.0;

/// What a seeding pass registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub instruments: usize,
    pub accounts: usize,
    pub generated: bool,
}

/// Register roster instruments and accounts.
///
/// An empty instrument list yields `roster.demo_instruments` generated
/// instruments. An empty account list yields one default account funded
/// with `ledger.starting_balance`.
pub fn seed_ledger<R: Rng>(
    store: &LedgerStore,
    roster: &RosterConfig,
    ledger: &LedgerConfig,
    rng: &mut R,
) -> Result<SeedReport, LedgerError> {
    let mut report = SeedReport::default();

    if roster.instruments.is_empty() {
        for instrument in demo_instruments(roster.demo_instruments, rng) {
            store.add_instrument(instrument)?;
            report.instruments += 1;
        }
        report.generated = true;
    } else {
        for entry in &roster.instruments {
            let instrument = Instrument::new(InstrumentId::from_raw(entry.id), &entry.name, entry.price)
                .with_details(&entry.team, &entry.position)
                .with_history(entry.history.iter().copied());
            store.add_instrument(instrument)?;
            report.instruments += 1;
        }
    }

    if roster.accounts.is_empty() {
        store.add_account(Account::new(
            AccountId::from_raw(1),
            "demo",
            ledger.starting_balance,
        ))?;
        report.accounts = 1;
    } else {
        for entry in &roster.accounts {
            let balance = entry.balance.unwrap_or(ledger.starting_balance);
            store.add_account(Account::new(AccountId::from_raw(entry.id), &entry.name, balance))?;
            report.accounts += 1;
        }
    }

    Ok(report)
}

/// Generate `count` instruments with ids `1..=count`.
///
/// Each gets a base price in [50, 200) and a full history of points within
/// +/-10 of it; the live price is the last history point.
pub fn demo_instruments<R: Rng>(count: usize, rng: &mut R) -> Vec<Instrument> {
    (0..count)
        .map(|i| {
            let (name, team, position) = DEMO_ROSTER[i % DEMO_ROSTER.len()];
            let name = match i / DEMO_ROSTER.len() {
                0 => name.to_string(),
                round => format!("{} {}", name, round + 1),
            };

            let base = rng.gen_range(DEMO_BASE_PRICE);
            let history: Vec<f64> = (0..HISTORY_CAPACITY)
                .map(|_| base + rng.gen_range(-DEMO_SPREAD..DEMO_SPREAD))
                .collect();
            let current = history.last().copied().unwrap_or(base);

            Instrument::new(InstrumentId::from_raw(i as u32 + 1), name, current)
                .with_details(team, position)
                .with_history(history)
        })
        .collect()
}
