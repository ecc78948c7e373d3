//! Process-wide job table.

use core::str::FromStr;

/// Default number of deliveries a message gets before it is poisoned.
pub const DEFAULT_MAX_DEQUEUE_COUNT: u32 = 5;

/// Every job a worker process can be started for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum JobName {
    CreateEmbeddings,
    SyncDocumentName,
    SyncDocumentPath,
    CalculateStorageUsage,
    MigrateBotSearchMethod,
    RecoverStalledDocuments,
}

impl JobName {
    pub const ALL: [JobName; 6] = [
        JobName::CreateEmbeddings,
        JobName::SyncDocumentName,
        JobName::SyncDocumentPath,
        JobName::CalculateStorageUsage,
        JobName::MigrateBotSearchMethod,
        JobName::RecoverStalledDocuments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::CreateEmbeddings => "create-embeddings",
            JobName::SyncDocumentName => "sync-document-name",
            JobName::SyncDocumentPath => "sync-document-path",
            JobName::CalculateStorageUsage => "calculate-storage-usage",
            JobName::MigrateBotSearchMethod => "migrate-bot-search-method",
            JobName::RecoverStalledDocuments => "recover-stalled-documents",
        }
    }

    pub fn descriptor(&self) -> &'static JobDescriptor {
        // The table has exactly one row per variant, in declaration order.
        &JOB_TABLE[*self as usize]
    }
}

impl core::fmt::Display for JobName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job name: {0}")]
pub struct UnknownJobName(pub String);

impl FromStr for JobName {
    type Err = UnknownJobName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownJobName(s.to_string()))
    }
}

/// How a job is triggered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Consumes one message per invocation from `queue`.
    Queue { queue: &'static str },
    /// Runs once per invocation with no message.
    Timer,
}

/// Retry budget for queue jobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deliveries allowed before the message is poisoned.
    pub max_dequeue_count: u32,
    /// `false` for one-shot jobs: any failure poisons the message.
    pub retries_allowed: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_dequeue_count: DEFAULT_MAX_DEQUEUE_COUNT,
            retries_allowed: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy that poisons on the first failure.
    pub const fn no_retry() -> Self {
        Self {
            max_dequeue_count: DEFAULT_MAX_DEQUEUE_COUNT,
            retries_allowed: false,
        }
    }

    pub fn with_max_dequeue_count(mut self, max: u32) -> Self {
        self.max_dequeue_count = max.max(1);
        self
    }

    /// The message already used up its budget; it must not reach a handler.
    pub fn is_exhausted(&self, dequeue_count: u32) -> bool {
        dequeue_count >= self.max_dequeue_count
    }

    /// A failed delivery may go back on the queue.
    pub fn should_retry(&self, dequeue_count: u32) -> bool {
        self.retries_allowed && dequeue_count < self.max_dequeue_count
    }

    /// No further delivery will reach a handler after this one.
    pub fn is_final_attempt(&self, dequeue_count: u32) -> bool {
        !self.retries_allowed || dequeue_count.saturating_add(1) >= self.max_dequeue_count
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub name: JobName,
    pub kind: JobKind,
    pub retry: RetryPolicy,
}

impl JobDescriptor {
    const fn queue(name: JobName, queue: &'static str, retry: RetryPolicy) -> Self {
        Self {
            name,
            kind: JobKind::Queue { queue },
            retry,
        }
    }

    pub fn all() -> &'static [JobDescriptor] {
        &JOB_TABLE
    }

    pub fn lookup(name: &str) -> Option<&'static JobDescriptor> {
        name.parse::<JobName>().ok().map(|n| n.descriptor())
    }

    /// Target queue, `None` for timer jobs.
    pub fn queue_name(&self) -> Option<&'static str> {
        match self.kind {
            JobKind::Queue { queue } => Some(queue),
            JobKind::Timer => None,
        }
    }
}

const RETRYING: RetryPolicy = RetryPolicy {
    max_dequeue_count: DEFAULT_MAX_DEQUEUE_COUNT,
    retries_allowed: true,
};

static JOB_TABLE: [JobDescriptor; 6] = [
    JobDescriptor::queue(JobName::CreateEmbeddings, "create-embeddings", RETRYING),
    JobDescriptor::queue(JobName::SyncDocumentName, "sync-document-name", RETRYING),
    JobDescriptor::queue(JobName::SyncDocumentPath, "sync-document-path", RETRYING),
    JobDescriptor::queue(JobName::CalculateStorageUsage, "calculate-storage-usage", RETRYING),
    JobDescriptor::queue(
        JobName::MigrateBotSearchMethod,
        "migrate-bot-search-method",
        RetryPolicy::no_retry(),
    ),
    JobDescriptor {
        name: JobName::RecoverStalledDocuments,
        kind: JobKind::Timer,
        retry: RETRYING,
    },
];
