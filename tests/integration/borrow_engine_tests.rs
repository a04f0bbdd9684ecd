//! Borrow engine against a real database.
//!
//! Each test gets a fresh, migrated database from `DATABASE_URL`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;

use libris_server::{
    models::{book::CreateBook, borrow::BorrowPolicy, user::Role},
    repository::Repository,
    AppError,
};

fn borrowed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

async fn member(repo: &Repository, email: &str, role: Role) -> i32 {
    repo.users
        .create("Reader", email, "$argon2id$unused", role)
        .await
        .expect("create user")
        .id
}

async fn book(repo: &Repository, title: &str, copies: i32) -> i32 {
    let book = CreateBook {
        title: title.to_string(),
        author: "Test Author".to_string(),
        category: None,
        isbn: None,
        publication_year: 2001,
        total_copies: copies,
        shelf_number: None,
        image: None,
    };
    repo.books.create(&book).await.expect("create book").id
}

#[sqlx::test(migrations = "./migrations")]
async fn late_return_debits_wallet_once(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let member_id = member(&repo, "late@example.org", Role::Member).await;
    let book_id = book(&repo, "Late Book", 1).await;

    let borrow = repo
        .borrows
        .borrow(member_id, book_id, &policy, borrowed_at())
        .await
        .expect("borrow");
    assert_eq!(borrow.due_date, borrowed_at() + Duration::days(7));
    assert_eq!(repo.books.get_by_id(book_id).await.unwrap().available_copies, 0);

    let returned_at = borrowed_at() + Duration::days(10);
    let receipt = repo
        .borrows
        .return_borrow(borrow.id, &policy, returned_at)
        .await
        .expect("return");

    assert_eq!(receipt.late_days, 3);
    assert_eq!(receipt.fine, 150_000);
    assert_eq!(repo.users.wallet(member_id).await.unwrap(), -150_000);
    assert_eq!(repo.books.get_by_id(book_id).await.unwrap().available_copies, 1);

    let recorded = repo.borrows.get_member_borrows(member_id).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].fine, 150_000);
    assert_eq!(recorded[0].return_date, Some(returned_at));

    let again = repo
        .borrows
        .return_borrow(borrow.id, &policy, returned_at + Duration::days(5))
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(repo.users.wallet(member_id).await.unwrap(), -150_000);
    assert_eq!(repo.books.get_by_id(book_id).await.unwrap().available_copies, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn on_time_return_is_free(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let member_id = member(&repo, "ontime@example.org", Role::Member).await;
    let book_id = book(&repo, "On Time", 2).await;

    let borrow = repo
        .borrows
        .borrow(member_id, book_id, &policy, borrowed_at())
        .await
        .expect("borrow");
    let receipt = repo
        .borrows
        .return_borrow(borrow.id, &policy, borrowed_at() + Duration::days(5))
        .await
        .expect("return");

    assert_eq!(receipt.fine, 0);
    assert_eq!(repo.users.wallet(member_id).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn fourth_borrow_hits_the_cap_until_a_return(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let member_id = member(&repo, "cap@example.org", Role::Member).await;

    let mut open = Vec::new();
    for n in 0..3 {
        let book_id = book(&repo, &format!("Cap {}", n), 1).await;
        let borrow = repo
            .borrows
            .borrow(member_id, book_id, &policy, borrowed_at())
            .await
            .expect("borrow under cap");
        open.push(borrow.id);
    }

    let fourth = book(&repo, "Cap 4", 1).await;
    let refused = repo.borrows.borrow(member_id, fourth, &policy, borrowed_at()).await;
    assert!(matches!(refused, Err(AppError::LimitExceeded(_))));
    assert_eq!(repo.books.get_by_id(fourth).await.unwrap().available_copies, 1);
    assert_eq!(repo.borrows.count_active().await.unwrap(), 3);

    repo.borrows
        .return_borrow(open[0], &policy, borrowed_at() + Duration::days(1))
        .await
        .expect("return");

    let borrow = repo.borrows.borrow(member_id, fourth, &policy, borrowed_at()).await;
    assert!(borrow.is_ok());
}

#[sqlx::test(migrations = "./migrations")]
async fn last_copy_goes_to_exactly_one_member(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let first = member(&repo, "first@example.org", Role::Member).await;
    let second = member(&repo, "second@example.org", Role::Member).await;
    let book_id = book(&repo, "Last Copy", 1).await;

    let (a, b) = tokio::join!(
        repo.borrows.borrow(first, book_id, &policy, borrowed_at()),
        repo.borrows.borrow(second, book_id, &policy, borrowed_at()),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppError::CapacityExceeded(_))))
            .count(),
        1
    );
    assert_eq!(repo.books.get_by_id(book_id).await.unwrap().available_copies, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn pending_and_admin_accounts_cannot_borrow(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let pending = member(&repo, "pending@example.org", Role::Pending).await;
    let admin = member(&repo, "admin@example.org", Role::Admin).await;
    let book_id = book(&repo, "Guarded", 1).await;

    for user_id in [pending, admin] {
        let refused = repo.borrows.borrow(user_id, book_id, &policy, borrowed_at()).await;
        assert!(matches!(refused, Err(AppError::Authorization(_))));
    }
    assert_eq!(repo.books.get_by_id(book_id).await.unwrap().available_copies, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn shrinking_below_lent_copies_is_refused(pool: PgPool) {
    let repo = Repository::new(pool);
    let policy = BorrowPolicy::default();
    let book_id = book(&repo, "Shrinking", 5).await;
    for n in 0..3 {
        let reader = member(&repo, &format!("shrink{}@example.org", n), Role::Member).await;
        repo.borrows
            .borrow(reader, book_id, &policy, borrowed_at())
            .await
            .expect("borrow");
    }

    let shrink = |total| libris_server::models::book::UpdateBook {
        total_copies: Some(total),
        ..Default::default()
    };

    let refused = repo.books.update(book_id, &shrink(2)).await;
    assert!(matches!(refused, Err(AppError::Conflict(_))));

    let updated = repo.books.update(book_id, &shrink(3)).await.expect("update");
    assert_eq!(updated.total_copies, 3);
    assert_eq!(updated.available_copies, 0);
}
