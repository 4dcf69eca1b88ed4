//! Database schema definitions

/// SQL to create all tables
/// NOTE: All prices/amounts stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Registered accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT,
    last_name TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_verified INTEGER NOT NULL DEFAULT 0,
    email_verification_token TEXT,
    password_reset_token TEXT,
    password_reset_expires TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_login TEXT
);

-- Marketplace listings a user bookmarked
CREATE TABLE IF NOT EXISTS saved_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    listing_id TEXT NOT NULL,
    title TEXT NOT NULL,
    price TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    image_url TEXT,
    item_url TEXT,
    condition TEXT,
    location TEXT,
    estimated_profit TEXT,
    confidence_score REAL,
    market_data TEXT,
    notes TEXT,
    tags TEXT,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'saved',
    purchase_price TEXT,
    purchase_date TEXT,
    sale_price TEXT,
    sale_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, listing_id)
);

-- Items a user actually owns (purchase -> listing -> sale lifecycle)
CREATE TABLE IF NOT EXISTS portfolio_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    item_name TEXT NOT NULL,
    brand TEXT,
    model TEXT,
    size TEXT,
    color TEXT,
    condition TEXT NOT NULL,
    category TEXT,
    purchase_price TEXT NOT NULL,
    purchase_date TEXT NOT NULL,
    purchase_platform TEXT,
    purchase_location TEXT,
    current_market_price TEXT,
    last_price_update TEXT,
    rating REAL,
    rating_factors TEXT,
    status TEXT NOT NULL DEFAULT 'owned',
    listing_price TEXT,
    listing_platform TEXT,
    listing_date TEXT,
    sale_price TEXT,
    sale_date TEXT,
    sale_platform TEXT,
    images TEXT,
    notes TEXT,
    tags TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Price alerts (threshold or percentage-change against a baseline)
CREATE TABLE IF NOT EXISTS price_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    item_identifier TEXT NOT NULL,
    platform TEXT,
    condition TEXT,
    alert_type TEXT NOT NULL,
    threshold_price TEXT,
    percentage_change REAL,
    is_active INTEGER NOT NULL DEFAULT 1,
    notification_method TEXT NOT NULL DEFAULT 'email',
    baseline_price TEXT,
    last_checked_price TEXT,
    last_triggered TEXT,
    trigger_count INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Log of notifications produced by triggered alerts
CREATE TABLE IF NOT EXISTS alert_notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id INTEGER NOT NULL REFERENCES price_alerts(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    sent_at TEXT,
    error_message TEXT,
    trigger_price TEXT,
    created_at TEXT NOT NULL
);

-- Time-series price points per item/platform/condition
CREATE TABLE IF NOT EXISTS market_trends (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_identifier TEXT NOT NULL,
    platform TEXT NOT NULL,
    condition TEXT NOT NULL,
    price TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    listing_count INTEGER NOT NULL DEFAULT 1,
    sold_count INTEGER NOT NULL DEFAULT 0,
    data_source TEXT,
    confidence_score REAL NOT NULL DEFAULT 0.5,
    recorded_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Per-query analytics snapshots
CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    query TEXT NOT NULL,
    results_count INTEGER NOT NULL DEFAULT 0,
    search_duration REAL,
    limit_requested INTEGER NOT NULL DEFAULT 20,
    avg_price TEXT,
    min_price TEXT,
    max_price TEXT,
    top_conditions TEXT,
    top_locations TEXT,
    items_saved_from_search INTEGER NOT NULL DEFAULT 0,
    search_success INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    created_at TEXT NOT NULL
);

-- One preference row per user
CREATE TABLE IF NOT EXISTS user_settings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    email_notifications INTEGER NOT NULL DEFAULT 1,
    push_notifications INTEGER NOT NULL DEFAULT 1,
    price_alert_notifications INTEGER NOT NULL DEFAULT 1,
    market_update_notifications INTEGER NOT NULL DEFAULT 0,
    newsletter_notifications INTEGER NOT NULL DEFAULT 0,
    dark_mode INTEGER NOT NULL DEFAULT 0,
    currency TEXT NOT NULL DEFAULT 'USD',
    language TEXT NOT NULL DEFAULT 'en',
    timezone TEXT NOT NULL DEFAULT 'UTC',
    items_per_page INTEGER NOT NULL DEFAULT 20,
    default_sort_order TEXT NOT NULL DEFAULT 'created_at_desc',
    show_profit_percentage INTEGER NOT NULL DEFAULT 1,
    show_rating INTEGER NOT NULL DEFAULT 1,
    profile_visibility TEXT NOT NULL DEFAULT 'private',
    share_analytics INTEGER NOT NULL DEFAULT 0,
    ebay_connected INTEGER NOT NULL DEFAULT 0,
    ebay_username TEXT,
    poshmark_connected INTEGER NOT NULL DEFAULT 0,
    poshmark_username TEXT,
    mercari_connected INTEGER NOT NULL DEFAULT 0,
    mercari_username TEXT,
    auto_update_market_prices INTEGER NOT NULL DEFAULT 1,
    price_update_frequency TEXT NOT NULL DEFAULT 'daily',
    enable_experimental_features INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_saved_items_user ON saved_items(user_id);
CREATE INDEX IF NOT EXISTS idx_saved_items_listing ON saved_items(listing_id);
CREATE INDEX IF NOT EXISTS idx_portfolio_user ON portfolio_items(user_id);
CREATE INDEX IF NOT EXISTS idx_alerts_user ON price_alerts(user_id);
CREATE INDEX IF NOT EXISTS idx_alerts_item ON price_alerts(item_identifier);
CREATE INDEX IF NOT EXISTS idx_trends_item ON market_trends(item_identifier, platform, condition);
CREATE INDEX IF NOT EXISTS idx_trends_recorded ON market_trends(recorded_at);
CREATE INDEX IF NOT EXISTS idx_history_user ON search_history(user_id);
CREATE INDEX IF NOT EXISTS idx_history_created ON search_history(created_at)
"#;

/// ALTER TABLE migrations for columns added after the initial schema shipped
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE saved_items ADD COLUMN shipping_cost TEXT",
    "ALTER TABLE market_trends ADD COLUMN average_days_to_sell REAL",
];
