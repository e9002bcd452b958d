//! Built-in schema history of the LMS application.
//!
//! Versions are append-only: never edit a unit that has shipped, add a new
//! one instead. Editing an applied unit shows up as checksum drift.

use tm_core::Dialect;
use tm_sql::{
    ColumnDef, ColumnDescriptor, ColumnType, IndexDef, InsertRows, ReferentialAction,
    TableConstraint, TableDef,
};

use crate::unit::{IdempotencyMode, MigrationUnit};

fn id() -> ColumnDef {
    ColumnDef::id()
}

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Text)
}

fn varchar(name: &str, len: u32) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Varchar(len))
}

fn integer(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Integer)
}

fn real(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Real)
}

fn boolean(name: &str, default: bool) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Boolean).default(default)
}

fn timestamp(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Timestamp)
}

fn timestamptz(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::TimestampTz)
}

fn created_at() -> ColumnDef {
    timestamp("created_at").default_now()
}

fn fk(name: &str, table: &str, on_delete: Option<ReferentialAction>) -> ColumnDef {
    integer(name).references(table, "id", on_delete)
}

fn user_fk() -> ColumnDef {
    fk("user_id", "users", Some(ReferentialAction::Cascade)).not_null()
}

fn token_table(name: &str, extra: Option<ColumnDef>) -> TableDef {
    let table = TableDef::new(name)
        .column(id())
        .column(user_fk())
        .column(text("token").not_null().unique())
        .column(timestamp("expires_at").not_null())
        .column(created_at());
    match extra {
        Some(column) => table.column(column),
        None => table,
    }
}

fn composite_key(columns: &[&str]) -> TableConstraint {
    TableConstraint::PrimaryKey {
        columns: columns.iter().map(|c| c.to_string()).collect(),
    }
}

fn blog_column(column: &str, column_type: ColumnType) -> ColumnDescriptor {
    ColumnDescriptor::new("blogs", column, column_type)
}

/// Every unit of the built-in history, for all dialects
pub fn units() -> Vec<MigrationUnit> {
    vec![
        accounts(),
        roles_and_groups(),
        default_roles(),
        content(),
        taxonomy(),
        blog_publishing(),
        blog_seo_columns(),
        default_categories(),
        payments(),
        quizzes(),
        slug_backfill_sqlite(),
        slug_backfill_postgres(),
        unique_blog_slugs(),
        rename_transaction_metadata(),
        api_analytics(),
        user_permissions(),
    ]
}

fn accounts() -> MigrationUnit {
    MigrationUnit::new(1, "create_accounts")
        .create_table(
            TableDef::new("messages")
                .column(id())
                .column(text("content").not_null())
                .column(created_at()),
        )
        .create_table(
            TableDef::new("users")
                .column(id())
                .column(text("email").not_null().unique())
                .column(text("hashed_password"))
                .column(text("full_name"))
                .column(boolean("is_active", true))
                .column(boolean("is_verified", false))
                .column(text("role").default("student"))
                .column(boolean("consent", false))
                .column(created_at())
                .column(timestamp("last_login")),
        )
        .create_table(
            TableDef::new("sessions")
                .column(id())
                .column(user_fk())
                .column(text("session_token").not_null().unique())
                .column(text("user_agent"))
                .column(text("ip_address"))
                .column(created_at())
                .column(timestamp("expires_at").not_null())
                .column(boolean("revoked", false)),
        )
        .create_table(token_table("email_verification_tokens", None))
        .create_table(token_table(
            "password_reset_tokens",
            Some(boolean("used", false)),
        ))
        .create_table(
            TableDef::new("oauth_accounts")
                .column(id())
                .column(user_fk())
                .column(text("provider").not_null())
                .column(text("provider_user_id").not_null())
                .column(text("access_token"))
                .column(text("refresh_token"))
                .column(timestamp("expires_at"))
                .column(created_at())
                .constraint(TableConstraint::Unique {
                    columns: vec!["provider".into(), "provider_user_id".into()],
                }),
        )
}

fn roles_and_groups() -> MigrationUnit {
    let permission_table = |name: &str| {
        TableDef::new(name)
            .column(id())
            .column(text("name").not_null().unique())
            .column(text("permissions").not_null())
            .column(text("description"))
            .column(created_at())
    };

    MigrationUnit::new(2, "create_roles_and_groups")
        .create_table(permission_table("roles"))
        .create_table(permission_table("groups"))
        .create_table(
            TableDef::new("user_groups")
                .column(user_fk())
                .column(fk("group_id", "groups", Some(ReferentialAction::Cascade)).not_null())
                .column(timestamp("added_at").default_now())
                .constraint(composite_key(&["user_id", "group_id"])),
        )
        .create_table(
            TableDef::new("audit_logs")
                .column(id())
                .column(fk("user_id", "users", Some(ReferentialAction::SetNull)))
                .column(text("action").not_null())
                .column(text("details"))
                .column(text("ip_address"))
                .column(created_at()),
        )
}

fn default_roles() -> MigrationUnit {
    MigrationUnit::new(3, "seed_default_roles").insert(
        InsertRows::new("roles", ["name", "permissions", "description"])
            .row([
                "admin",
                r#"["*"]"#,
                "Full access to every resource",
            ])
            .row([
                "instructor",
                r#"["courses:write","blogs:write","quizzes:write"]"#,
                "Manages courses, blogs and quizzes",
            ])
            .row([
                "student",
                r#"["courses:read","quizzes:take"]"#,
                "Enrolled learner",
            ])
            .on_conflict(["name"]),
    )
}

fn content() -> MigrationUnit {
    MigrationUnit::new(4, "create_content")
        .create_table(
            TableDef::new("courses")
                .column(id())
                .column(text("title").not_null())
                .column(text("description"))
                .column(text("instructor"))
                .column(text("duration"))
                .column(text("level"))
                .column(text("category"))
                .column(text("image_url"))
                .column(boolean("published", false))
                .column(created_at()),
        )
        .create_table(
            TableDef::new("blogs")
                .column(id())
                .column(text("title").not_null())
                .column(text("excerpt"))
                .column(text("content").not_null())
                .column(text("author"))
                .column(text("category"))
                .column(text("image_url"))
                .column(boolean("published", false))
                .column(created_at()),
        )
}

fn taxonomy() -> MigrationUnit {
    let cascade = Some(ReferentialAction::Cascade);
    MigrationUnit::new(5, "create_taxonomy")
        .create_table(
            TableDef::new("categories")
                .column(id())
                .column(text("name").not_null().unique())
                .column(text("slug").not_null().unique())
                .column(text("description"))
                .column(created_at()),
        )
        .create_table(
            TableDef::new("tags")
                .column(id())
                .column(text("name").not_null().unique())
                .column(text("slug").not_null().unique())
                .column(created_at()),
        )
        .create_table(
            TableDef::new("blog_tags")
                .column(fk("blog_id", "blogs", cascade).not_null())
                .column(fk("tag_id", "tags", cascade).not_null())
                .constraint(composite_key(&["blog_id", "tag_id"])),
        )
}

/// Legacy scripts added these with a bare ALTER and ignored "duplicate
/// column" errors; keep that contract explicit.
fn blog_publishing() -> MigrationUnit {
    MigrationUnit::new(6, "add_blog_publishing")
        .mode(IdempotencyMode::BestEffort)
        .add_column(blog_column("publish_at", ColumnType::Timestamp))
        .add_column(blog_column("tags", ColumnType::Text).default("[]"))
}

fn blog_seo_columns() -> MigrationUnit {
    let mut unit = MigrationUnit::new(7, "add_blog_seo_columns")
        .add_column(blog_column("slug", ColumnType::Varchar(255)))
        .add_column(blog_column("featured", ColumnType::Boolean).default(false));
    for column in [
        "image_alt",
        "meta_title",
        "meta_description",
        "canonical_url",
        "og_title",
        "og_description",
        "og_image_url",
        "og_image_alt",
    ] {
        unit = unit.add_column(blog_column(column, ColumnType::Text));
    }
    unit.add_column(blog_column("word_count", ColumnType::Integer).default(0i64))
        .add_column(blog_column("reading_time", ColumnType::Real).default(0.0))
        .add_column(blog_column("categories", ColumnType::Text).default("[]"))
}

fn default_categories() -> MigrationUnit {
    MigrationUnit::new(8, "seed_default_categories").insert(
        InsertRows::new("categories", ["name", "slug", "description"])
            .row([
                "Market Analysis",
                "market-analysis",
                "In-depth analysis of market trends",
            ])
            .row([
                "Investment Tips",
                "investment-tips",
                "Practical investment advice",
            ])
            .row([
                "Trading Strategies",
                "trading-strategies",
                "Expert trading strategies",
            ])
            .row([
                "Financial News",
                "financial-news",
                "Latest financial updates",
            ])
            .row([
                "Industry Insights",
                "industry-insights",
                "Industry trends and insights",
            ])
            .on_conflict(["slug"]),
    )
}

fn payments() -> MigrationUnit {
    let now = || timestamptz("created_at").default_now();
    MigrationUnit::new(9, "create_payments")
        .create_table(
            TableDef::new("orders")
                .column(id())
                .column(fk("user_id", "users", None).not_null())
                .column(fk("course_id", "courses", None).not_null())
                .column(varchar("order_number", 50).not_null())
                .column(varchar("status", 20).not_null())
                .column(real("amount").not_null())
                .column(varchar("currency", 3).not_null())
                .column(real("discount_amount"))
                .column(real("tax_amount"))
                .column(real("total_amount").not_null())
                .column(varchar("coupon_code", 50))
                .column(now())
                .column(timestamptz("updated_at"))
                .column(timestamptz("completed_at")),
        )
        .index(IndexDef::new("ix_orders_order_number", "orders", ["order_number"]).unique())
        .create_table(
            TableDef::new("payments")
                .column(id())
                .column(fk("order_id", "orders", None).not_null())
                .column(varchar("payment_method", 50).not_null())
                .column(varchar("status", 20).not_null())
                .column(varchar("stripe_payment_intent_id", 255))
                .column(varchar("stripe_charge_id", 255))
                .column(varchar("stripe_customer_id", 255))
                .column(real("amount").not_null())
                .column(varchar("currency", 3).not_null())
                .column(text("failure_reason"))
                .column(varchar("receipt_url", 500))
                .column(now())
                .column(timestamptz("updated_at"))
                .column(timestamptz("completed_at")),
        )
        .index(
            IndexDef::new(
                "ix_payments_stripe_payment_intent_id",
                "payments",
                ["stripe_payment_intent_id"],
            )
            .unique(),
        )
        .create_table(
            TableDef::new("transactions")
                .column(id())
                .column(fk("user_id", "users", None).not_null())
                .column(fk("order_id", "orders", None))
                .column(varchar("transaction_type", 50).not_null())
                .column(real("amount").not_null())
                .column(varchar("currency", 3).not_null())
                .column(varchar("status", 50).not_null())
                .column(text("description"))
                .column(text("metadata"))
                .column(varchar("stripe_transaction_id", 255))
                .column(now()),
        )
        .index(IndexDef::new(
            "ix_transactions_stripe_transaction_id",
            "transactions",
            ["stripe_transaction_id"],
        ))
        .create_table(
            TableDef::new("coupons")
                .column(id())
                .column(varchar("code", 50).not_null())
                .column(text("description"))
                .column(varchar("discount_type", 20).not_null())
                .column(real("discount_value").not_null())
                .column(real("max_discount"))
                .column(integer("max_uses"))
                .column(integer("used_count").default(0i64))
                .column(integer("max_uses_per_user"))
                .column(boolean("is_active", true))
                .column(timestamptz("valid_from"))
                .column(timestamptz("valid_until"))
                .column(fk("course_id", "courses", None))
                .column(now())
                .column(timestamptz("updated_at")),
        )
        .index(IndexDef::new("ix_coupons_code", "coupons", ["code"]).unique())
}

fn quizzes() -> MigrationUnit {
    let cascade = Some(ReferentialAction::Cascade);
    MigrationUnit::new(10, "create_quizzes")
        .create_table(
            TableDef::new("quizzes")
                .column(id())
                .column(fk("course_id", "courses", cascade))
                .column(integer("section_id"))
                .column(text("title").not_null())
                .column(text("description"))
                .column(integer("duration_minutes"))
                .column(integer("passing_score").not_null().default(70i64))
                .column(integer("max_attempts"))
                .column(boolean("show_correct_answers", true).not_null())
                .column(boolean("randomize_questions", false).not_null())
                .column(boolean("randomize_options", false).not_null())
                .column(boolean("published", true).not_null())
                .column(created_at().not_null())
                .column(timestamp("updated_at").not_null().default_now()),
        )
        .index(IndexDef::new("ix_quizzes_course_id", "quizzes", ["course_id"]))
        .index(IndexDef::new("ix_quizzes_section_id", "quizzes", ["section_id"]))
        .create_table(
            TableDef::new("quiz_questions")
                .column(id())
                .column(fk("quiz_id", "quizzes", cascade).not_null())
                .column(text("question_text").not_null())
                .column(text("question_type").not_null().default("multiple_choice"))
                .column(integer("points").not_null().default(1i64))
                .column(integer("order").not_null().default(0i64))
                .column(text("explanation"))
                .column(created_at().not_null()),
        )
        .index(IndexDef::new(
            "ix_quiz_questions_quiz_id",
            "quiz_questions",
            ["quiz_id"],
        ))
        .create_table(
            TableDef::new("quiz_options")
                .column(id())
                .column(fk("question_id", "quiz_questions", cascade).not_null())
                .column(text("option_text").not_null())
                .column(boolean("is_correct", false).not_null())
                .column(integer("order").not_null().default(0i64))
                .column(created_at().not_null()),
        )
        .index(IndexDef::new(
            "ix_quiz_options_question_id",
            "quiz_options",
            ["question_id"],
        ))
        .create_table(
            TableDef::new("quiz_attempts")
                .column(id())
                .column(fk("quiz_id", "quizzes", cascade).not_null())
                .column(fk("user_id", "users", cascade).not_null())
                .column(real("score"))
                .column(integer("total_points").not_null())
                .column(integer("earned_points").not_null().default(0i64))
                .column(ColumnDef::new("passed", ColumnType::Boolean))
                .column(timestamp("started_at").not_null().default_now())
                .column(timestamp("completed_at"))
                .column(integer("time_taken_seconds")),
        )
        .index(IndexDef::new(
            "ix_quiz_attempts_quiz_id",
            "quiz_attempts",
            ["quiz_id"],
        ))
        .index(IndexDef::new(
            "ix_quiz_attempts_user_id",
            "quiz_attempts",
            ["user_id"],
        ))
        .index(IndexDef::new(
            "ix_quiz_attempts_quiz_user",
            "quiz_attempts",
            ["quiz_id", "user_id"],
        ))
        .create_table(
            TableDef::new("quiz_answers")
                .column(id())
                .column(fk("attempt_id", "quiz_attempts", cascade).not_null())
                .column(fk("question_id", "quiz_questions", cascade).not_null())
                .column(fk("selected_option_id", "quiz_options", Some(ReferentialAction::SetNull)))
                .column(text("answer_text"))
                .column(ColumnDef::new("is_correct", ColumnType::Boolean))
                .column(integer("points_earned").not_null().default(0i64))
                .column(timestamp("answered_at").not_null().default_now()),
        )
        .index(IndexDef::new(
            "ix_quiz_answers_attempt_id",
            "quiz_answers",
            ["attempt_id"],
        ))
        .index(IndexDef::new(
            "ix_quiz_answers_question_id",
            "quiz_answers",
            ["question_id"],
        ))
}

const SLUG_BACKFILL: &str = "backfill_blog_slugs";

fn slug_backfill_sqlite() -> MigrationUnit {
    MigrationUnit::new(11, SLUG_BACKFILL)
        .only_for(Dialect::Sqlite)
        .mode(IdempotencyMode::Unguarded)
        .raw(
            "UPDATE blogs SET slug = LOWER(REPLACE(TRIM(title), ' ', '-')) \
             WHERE slug IS NULL OR slug = ''",
        )
}

fn slug_backfill_postgres() -> MigrationUnit {
    MigrationUnit::new(11, SLUG_BACKFILL)
        .only_for(Dialect::Postgres)
        .mode(IdempotencyMode::Unguarded)
        .raw(
            r"UPDATE blogs SET slug = LOWER(REGEXP_REPLACE(REGEXP_REPLACE(TRIM(title), '[^a-zA-Z0-9\s-]', '', 'g'), '\s+', '-', 'g')) WHERE slug IS NULL OR slug = ''",
        )
}

fn unique_blog_slugs() -> MigrationUnit {
    MigrationUnit::new(12, "unique_blog_slugs")
        .index(IndexDef::new("ix_blogs_slug", "blogs", ["slug"]).unique())
}

/// `transactions.metadata` is expected as `extra_data` by the application.
/// Values are not carried over.
fn rename_transaction_metadata() -> MigrationUnit {
    MigrationUnit::new(13, "rename_transaction_metadata")
        .mode(IdempotencyMode::BestEffort)
        .rename_as_add(
            "metadata",
            ColumnDescriptor::new("transactions", "extra_data", ColumnType::Text),
        )
}

/// Request log written by the API middleware. `user_id` has no foreign key;
/// rows outlive their user.
fn api_analytics() -> MigrationUnit {
    let single = [
        "id",
        "endpoint",
        "method",
        "status_code",
        "user_id",
        "ip_address",
        "city",
        "country",
        "created_at",
    ];
    let composite: [(&str, [&str; 2]); 5] = [
        ("idx_endpoint_method", ["endpoint", "method"]),
        ("idx_endpoint_created", ["endpoint", "created_at"]),
        ("idx_status_created", ["status_code", "created_at"]),
        ("idx_user_created", ["user_id", "created_at"]),
        ("idx_city_country", ["city", "country"]),
    ];

    let unit = MigrationUnit::new(14, "create_api_analytics").create_table(
        TableDef::new("api_analytics")
            .column(id())
            .column(varchar("endpoint", 500).not_null())
            .column(varchar("method", 10).not_null())
            .column(varchar("path", 500).not_null())
            .column(text("query_params"))
            .column(integer("status_code").not_null())
            .column(real("response_time").not_null())
            .column(integer("user_id"))
            .column(varchar("ip_address", 45))
            .column(varchar("city", 100))
            .column(varchar("region", 100))
            .column(varchar("country", 100))
            .column(varchar("country_code", 2))
            .column(real("latitude"))
            .column(real("longitude"))
            .column(text("request_headers"))
            .column(text("request_body"))
            .column(text("response_body"))
            .column(text("error_message"))
            .column(created_at().not_null())
            .column(varchar("user_agent", 500))
            .column(varchar("referer", 500)),
    );
    let unit = single.iter().fold(unit, |unit, column| {
        unit.index(IndexDef::new(
            format!("idx_api_analytics_{column}"),
            "api_analytics",
            [*column],
        ))
    });
    composite.iter().fold(unit, |unit, (name, columns)| {
        unit.index(IndexDef::new(*name, "api_analytics", *columns))
    })
}

/// Direct grants that bypass roles and groups
fn user_permissions() -> MigrationUnit {
    MigrationUnit::new(15, "create_user_permissions").create_table(
        TableDef::new("user_permissions")
            .column(user_fk())
            .column(text("permission").not_null())
            .constraint(composite_key(&["user_id", "permission"])),
    )
}
