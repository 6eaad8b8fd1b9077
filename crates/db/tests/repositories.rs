use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use orderline_core::{
    build_draft_summary, DraftOrder, DraftRecord, Order, OrderId, OrderStatus, OrderTotals,
    PosEnvironment, PosProvider, PricingOutcome, ProviderCredential, Selection, SelectionModifier,
};
use orderline_db::repositories::{
    CredentialRepository, MenuRepository, OrderRepository, RestaurantRepository,
    SqlCredentialRepository, SqlMenuRepository, SqlOrderRepository, SqlRestaurantRepository,
};
use orderline_db::{
    connect_with_settings, migrations, sample_menu, seed_sample_restaurant, DbPool, SeedOptions,
    SeedResult,
};

// In-memory SQLite gives every connection its own database, so tests pin the
// pool to a single connection.
async fn seeded_pool() -> (DbPool, SeedResult) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    let seed = seed_sample_restaurant(&pool, SeedOptions::default()).await.expect("seed");
    (pool, seed)
}

fn burger_draft() -> DraftRecord {
    let draft = DraftOrder {
        selections: vec![Selection {
            item_id: orderline_db::fixtures::ITEM_CLASSIC_BURGER.to_owned(),
            quantity: 2,
            modifiers: vec![SelectionModifier {
                group_id: orderline_db::fixtures::GROUP_CHEESE.to_owned(),
                option_ids: vec![orderline_db::fixtures::OPT_CHEDDAR.to_owned()],
            }],
            special_instructions: None,
        }],
        notes: Some("no pickles".to_owned()),
        pickup_name: Some("Jordan".to_owned()),
        pickup_phone: None,
    };
    let summary = build_draft_summary(&sample_menu(), &draft).expect("valid draft");
    DraftRecord { draft, summary }
}

fn new_order(seed: &SeedResult, client_order_id: &str) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId(Uuid::new_v4().to_string()),
        restaurant_id: seed.restaurant_id.clone(),
        call_id: Some(seed.call_id.clone()),
        status: OrderStatus::Draft,
        draft: burger_draft(),
        priced: None,
        provider_order_id: None,
        client_order_id: client_order_id.to_owned(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn restaurant_lookup_by_phone_and_id() {
    let (pool, seed) = seeded_pool().await;
    let restaurants = SqlRestaurantRepository::new(pool);

    let by_phone =
        restaurants.find_by_phone("+15551234567").await.expect("query").expect("seeded");
    assert_eq!(by_phone.id, seed.restaurant_id);
    assert!(by_phone.is_active());
    assert_eq!(by_phone.provider().expect("provider"), PosProvider::Toast);

    let by_id =
        restaurants.find_by_id(&seed.restaurant_id).await.expect("query").expect("seeded");
    assert_eq!(by_id.phone_number, "+15551234567");

    assert!(restaurants.find_by_phone("+15550000000").await.expect("query").is_none());
}

#[tokio::test]
async fn set_provider_rewrites_the_configured_backend() {
    let (pool, seed) = seeded_pool().await;
    let restaurants = SqlRestaurantRepository::new(pool);

    restaurants.set_provider(&seed.restaurant_id, PosProvider::Clover).await.expect("update");

    let restaurant =
        restaurants.find_by_id(&seed.restaurant_id).await.expect("query").expect("seeded");
    assert_eq!(restaurant.provider().expect("provider"), PosProvider::Clover);
}

#[tokio::test]
async fn menu_replace_bumps_version_and_rehashes() {
    let (pool, seed) = seeded_pool().await;
    let menus = SqlMenuRepository::new(pool);
    assert_eq!(seed.menu_version, 1);

    let first =
        menus.find_for_restaurant(&seed.restaurant_id).await.expect("query").expect("seeded");
    assert_eq!(first.version, 1);
    assert_eq!(first.source_hash, sample_menu().content_hash());

    let mut changed = sample_menu();
    changed.items[0].price_cents += 100;
    let version = menus.replace(&seed.restaurant_id, &changed).await.expect("replace");
    assert_eq!(version, 2);

    let second =
        menus.find_for_restaurant(&seed.restaurant_id).await.expect("query").expect("seeded");
    assert_eq!(second.version, 2);
    assert_ne!(second.source_hash, first.source_hash);
    assert_eq!(second.menu, changed);
}

#[tokio::test]
async fn order_draft_round_trips_and_advances_through_states() {
    let (pool, seed) = seeded_pool().await;
    let orders = SqlOrderRepository::new(pool);

    let order = new_order(&seed, "key-round-trip");
    orders.insert_draft(&order).await.expect("insert");

    let stored = orders.find_by_id(&order.id).await.expect("query").expect("inserted");
    assert_eq!(stored.status, OrderStatus::Draft);
    assert_eq!(stored.draft, order.draft);
    assert_eq!(stored.draft.summary.subtotal_cents, 2398);
    assert!(stored.priced.is_none());

    let outcome = PricingOutcome {
        pricing_mode: "provider".to_owned(),
        totals: OrderTotals { subtotal_cents: 2398, tax_cents: 210, total_cents: 2608 },
        raw: serde_json::json!({"checkId": "chk-1"}),
    };
    orders.set_priced(&order.id, &outcome).await.expect("price");

    let priced = orders.find_by_id(&order.id).await.expect("query").expect("inserted");
    assert_eq!(priced.status, OrderStatus::Priced);
    assert_eq!(priced.priced.as_ref().map(|p| p.totals.total_cents), Some(2608));

    orders.set_confirmed(&order.id, "toast-order-9").await.expect("confirm");
    let confirmed = orders.find_by_id(&order.id).await.expect("query").expect("inserted");
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.provider_order_id.as_deref(), Some("toast-order-9"));
}

#[tokio::test]
async fn duplicate_client_order_id_is_a_unique_violation() {
    let (pool, seed) = seeded_pool().await;
    let orders = SqlOrderRepository::new(pool);

    orders.insert_draft(&new_order(&seed, "key-dup")).await.expect("first insert");

    let error = orders
        .insert_draft(&new_order(&seed, "key-dup"))
        .await
        .expect_err("second insert must fail");
    assert!(error.is_unique_violation(), "unexpected error: {error}");
}

#[tokio::test]
async fn client_order_id_lookup_and_reassignment() {
    let (pool, seed) = seeded_pool().await;
    let orders = SqlOrderRepository::new(pool);

    let order = new_order(&seed, "key-original");
    orders.insert_draft(&order).await.expect("insert");

    let found = orders
        .find_by_client_order_id("key-original")
        .await
        .expect("query")
        .expect("inserted");
    assert_eq!(found.id, order.id);

    orders.set_client_order_id(&order.id, "key-reconciled").await.expect("reassign");
    assert!(orders.find_by_client_order_id("key-original").await.expect("query").is_none());
    let reassigned = orders
        .find_by_client_order_id("key-reconciled")
        .await
        .expect("query")
        .expect("inserted");
    assert_eq!(reassigned.id, order.id);
}

#[tokio::test]
async fn credential_upsert_overwrites_and_update_token_persists_expiry() {
    let (pool, seed) = seeded_pool().await;
    let credentials = SqlCredentialRepository::new(pool);

    let seeded = credentials
        .find(&seed.restaurant_id, PosProvider::Toast)
        .await
        .expect("query")
        .expect("seeded");
    assert_eq!(seeded.access_token.as_deref(), Some("seed-cached-token"));
    assert_eq!(seeded.environment, PosEnvironment::Sandbox);

    credentials
        .upsert(&ProviderCredential {
            restaurant_id: seed.restaurant_id.clone(),
            provider: PosProvider::Toast,
            merchant_ref: "merchant-rotated".to_owned(),
            client_id: "rotated-id".to_owned(),
            client_secret: SecretString::from("rotated-secret"),
            environment: PosEnvironment::Prod,
            access_token: None,
            token_expires_at: None,
        })
        .await
        .expect("upsert");

    let rotated = credentials
        .find(&seed.restaurant_id, PosProvider::Toast)
        .await
        .expect("query")
        .expect("upserted");
    assert_eq!(rotated.merchant_ref, "merchant-rotated");
    assert_eq!(rotated.client_secret.expose_secret(), "rotated-secret");
    assert_eq!(rotated.environment, PosEnvironment::Prod);

    let expires_at = Utc::now() + Duration::hours(1);
    credentials
        .update_token(&seed.restaurant_id, PosProvider::Toast, "fresh-token", expires_at)
        .await
        .expect("token write");

    let refreshed = credentials
        .find(&seed.restaurant_id, PosProvider::Toast)
        .await
        .expect("query")
        .expect("upserted");
    assert_eq!(refreshed.access_token.as_deref(), Some("fresh-token"));
    assert!(refreshed.token_valid_for(60).is_some());
}

#[tokio::test]
async fn credential_rows_are_scoped_per_provider() {
    let (pool, seed) = seeded_pool().await;
    let credentials = SqlCredentialRepository::new(pool);

    assert!(credentials
        .find(&seed.restaurant_id, PosProvider::Clover)
        .await
        .expect("query")
        .is_none());
}
