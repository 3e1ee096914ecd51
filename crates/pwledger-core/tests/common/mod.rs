use pwledger_core::commands::{Command, ExecContext, Outcome};
use pwledger_core::model::{DependentKind, Entry};
use pwledger_core::{CoreConfig, EntryStore, FixedClock, MemoryAttachments, Result, TransactionLog};
use uuid::Uuid;

/// 2024-03-01 12:00:00 UTC
#[allow(dead_code)]
pub const T0: i64 = 1_709_294_400;

/// A store, its log and every collaborator a command needs
#[allow(dead_code)]
pub struct Harness {
    pub store: EntryStore,
    pub log: TransactionLog,
    pub config: CoreConfig,
    pub clock: FixedClock,
    pub attachments: MemoryAttachments,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self {
            store: EntryStore::new(),
            log: TransactionLog::new(),
            config: CoreConfig::default(),
            clock: FixedClock::new(T0),
            attachments: MemoryAttachments::new(),
        }
    }

    pub fn exec(&mut self, command: Command) -> Result<Outcome> {
        let mut ctx = ExecContext {
            config: &self.config,
            clock: &self.clock,
            attachments: &mut self.attachments,
        };
        self.log.execute(command, &mut self.store, &mut ctx)
    }

    pub fn undo(&mut self) -> Result<()> {
        let mut ctx = ExecContext {
            config: &self.config,
            clock: &self.clock,
            attachments: &mut self.attachments,
        };
        self.log.undo(&mut self.store, &mut ctx)
    }

    pub fn redo(&mut self) -> Result<Outcome> {
        let mut ctx = ExecContext {
            config: &self.config,
            clock: &self.clock,
            attachments: &mut self.attachments,
        };
        self.log.redo(&mut self.store, &mut ctx)
    }

    /// Add a normal entry through the log
    pub fn add(&mut self, group: &str, title: &str, user: &str, password: &str) -> Uuid {
        let entry = Entry::new(group, title, user, password);
        let uuid = entry.uuid;
        self.exec(Command::add(entry)).unwrap();
        uuid
    }

    /// Add a dependent of `base` through the log
    pub fn add_dependent(&mut self, base: Uuid, kind: DependentKind, title: &str) -> Uuid {
        let entry = Entry::new("deps", title, "", "");
        let uuid = entry.uuid;
        self.exec(Command::add_dependent(entry, base, kind)).unwrap();
        uuid
    }
}

/// Build a GTU-validated store from entries
#[allow(dead_code)]
pub fn validated_store(name: &str, entries: Vec<Entry>) -> EntryStore {
    let mut store = EntryStore::from_entries(name, entries, vec![]).unwrap();
    store.initialise_gtu().unwrap();
    store
}

/// Run a planned command against `store` through a fresh log
#[allow(dead_code)]
pub fn apply_plan(store: &mut EntryStore, log: &mut TransactionLog, command: Command) -> Outcome {
    let config = CoreConfig::default();
    let clock = FixedClock::new(T0);
    let mut attachments = MemoryAttachments::new();
    let mut ctx = ExecContext {
        config: &config,
        clock: &clock,
        attachments: &mut attachments,
    };
    log.execute(command, store, &mut ctx).unwrap()
}
