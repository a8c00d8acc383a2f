mod support;

use std::sync::atomic::Ordering;

use reliquary_client::{
    CharacterSheet, CharacterView, Client, Entered, Route, Screen, Session, ViewError,
};

use support::{MockBackend, TIMEOUT, config, ephemeral, eventually, hasher};

fn gift_names(sheet: &CharacterSheet) -> Vec<String> {
    sheet.gifts.iter().map(|g| g.detail.name.clone()).collect()
}

async fn wait_for_gifts(view: &mut CharacterView, count: usize) -> CharacterSheet {
    loop {
        let sheet = view.render();
        if sheet.gifts.len() >= count {
            return sheet;
        }
        let changed = tokio::time::timeout(TIMEOUT, view.changed())
            .await
            .expect("roster never changed");
        assert!(changed, "event feed stopped");
    }
}

#[tokio::test]
async fn pushed_gift_sorts_into_baseline() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    backend.link_gift(toji.id, "Ember");
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let mut view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();
    assert_eq!(view.character().name, "Toji");
    assert_eq!(gift_names(&view.render()), ["Ember"]);

    let event = backend.link_gift(toji.id, "Aether");
    backend.publish(event);

    let sheet = wait_for_gifts(&mut view, 2).await;
    assert_eq!(gift_names(&sheet), ["Aether", "Ember"]);
    assert!(sheet.gifts[0].fresh);
    assert!(!sheet.gifts[1].fresh);

    view.close().await;
}

#[tokio::test]
async fn event_arriving_before_baseline_sorts_the_same() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    backend.link_gift(toji.id, "Ember");
    let early = backend.link_gift(toji.id, "Aether");
    backend.queue_for_next_subscriber(early);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let mut view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();

    let sheet = wait_for_gifts(&mut view, 2).await;
    assert_eq!(gift_names(&sheet), ["Aether", "Ember"]);

    // Redelivery and the baseline overlap must not duplicate it.
    backend.publish(early);
    let item = backend.link_item(toji.id, "Lantern");
    backend.publish(item);
    assert!(eventually(|| view.render().items.len() == 1).await);
    assert_eq!(view.render().gifts.len(), 2);

    view.close().await;
}

#[tokio::test]
async fn other_characters_events_are_not_shown() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let talik = backend.add_character("Talik", None);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let mut view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();

    let theirs = backend.link_gift(talik.id, "Aether");
    backend.publish(theirs);
    let ours = backend.link_gift(toji.id, "Ember");
    backend.publish(ours);

    let sheet = wait_for_gifts(&mut view, 1).await;
    assert_eq!(gift_names(&sheet), ["Ember"]);

    view.close().await;
}

#[tokio::test]
async fn failed_detail_fetch_is_retried() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let mut view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();

    backend.fail_details.store(1, Ordering::SeqCst);
    let event = backend.link_gift(toji.id, "Aether");
    backend.publish(event);

    assert!(eventually(|| view.last_error().is_some()).await);
    assert!(view.render().gifts.is_empty());
    assert!(view.render().error.is_some());

    let sheet = wait_for_gifts(&mut view, 1).await;
    assert_eq!(gift_names(&sheet), ["Aether"]);
    assert!(eventually(|| view.last_error().is_none()).await);
    assert_eq!(backend.fail_details.load(Ordering::SeqCst), 0);

    view.close().await;
    assert_eq!(backend.released(), 1);
}

#[tokio::test]
async fn ended_feed_is_reported_and_released() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let mut view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();
    assert_eq!(view.last_error(), None);

    backend.close_feeds();
    loop {
        let changed = tokio::time::timeout(TIMEOUT, view.changed())
            .await
            .expect("feed end never observed");
        if !changed {
            break;
        }
    }

    assert!(view.render().error.is_some());
    assert!(eventually(|| backend.released() == 1).await);
    view.close().await;
    assert_eq!(backend.released(), 1);
}

#[tokio::test]
async fn close_releases_subscription_once() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap()
        .into_view()
        .unwrap();
    view.close().await;

    assert_eq!(backend.released(), 1);
}

#[tokio::test]
async fn drop_releases_subscription_once() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let view = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT)
        .await
        .unwrap();
    drop(view);

    assert!(eventually(|| backend.released() == 1).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(backend.released(), 1);
}

#[tokio::test]
async fn failed_baseline_releases_subscription_once() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    backend.fail_rosters.store(true, Ordering::SeqCst);
    let session = ephemeral(Some(Session::Player { character_id: toji.id }));

    let result = CharacterView::enter(backend.clone(), &session, toji.id, TIMEOUT).await;
    let err = result.err().unwrap();
    assert!(err.is_retryable());

    assert_eq!(backend.subscribed.load(Ordering::SeqCst), 1);
    assert!(eventually(|| backend.released() == 1).await);
}

#[tokio::test]
async fn missing_character_is_not_found() {
    let backend = MockBackend::new();
    let id = uuid::Uuid::new_v4();
    let session = ephemeral(Some(Session::Player { character_id: id }));

    let result = CharacterView::enter(backend.clone(), &session, id, TIMEOUT).await;
    assert!(matches!(result, Err(ViewError::CharacterNotFound(missing)) if missing == id));
    assert!(eventually(|| backend.released() == 1).await);
}

#[tokio::test]
async fn guard_redirects_before_subscribing() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let talik = backend.add_character("Talik", None);

    for session in [
        None,
        Some(Session::Admin),
        Some(Session::Player { character_id: talik.id }),
    ] {
        let entered = CharacterView::enter(backend.clone(), &ephemeral(session), toji.id, TIMEOUT)
            .await
            .unwrap();
        assert!(matches!(entered, Entered::Redirect(Route::Entry)));
    }
    assert_eq!(backend.subscribed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn client_navigation_follows_redirects() {
    let backend = MockBackend::new();
    let toji = backend.add_character("Toji", None);
    let talik = backend.add_character("Talik", None);
    let session = ephemeral(Some(Session::Player { character_id: talik.id }));
    let client = Client::new(backend.clone(), session, hasher(), config());

    assert_eq!(client.start_route(), Route::Character(talik.id));

    let screen = client.navigate(Route::Character(toji.id)).await.unwrap();
    assert_eq!(screen.route(), Route::Entry);

    let screen = client.navigate(Route::Admin).await.unwrap();
    assert!(matches!(screen, Screen::Entry(_)));

    let screen = client.navigate(client.start_route()).await.unwrap();
    assert_eq!(screen.route(), Route::Character(talik.id));
    drop(screen);

    client.logout().unwrap();
    assert_eq!(client.start_route(), Route::Entry);
}
