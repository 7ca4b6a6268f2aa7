pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const BRAIN: &str = "🧠";
    pub const QUESTION: &str = "💬";
    pub const RETRY: &str = "🔁";
    pub const EMPTY: &str = "📭";
    pub const STATS: &str = "📊";
}
