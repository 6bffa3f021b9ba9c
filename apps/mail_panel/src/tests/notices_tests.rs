use std::time::{Duration, Instant};

use super::NoticeBoard;
use crate::controller::events::Notice;

#[test]
fn success_notice_expires_before_error_notice() {
    let mut board = NoticeBoard::default();
    let start = Instant::now();
    board.post(Notice::error("Failed to load boxes."), start);
    board.post(Notice::success("Box created successfully!"), start);

    assert_eq!(board.visible(start + Duration::from_secs(1)).len(), 2);

    let later = board.visible(start + Duration::from_secs(4));
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].message, "Failed to load boxes.");

    assert!(board.visible(start + Duration::from_secs(5)).is_empty());
}

#[test]
fn newest_notice_is_listed_first() {
    let mut board = NoticeBoard::default();
    let start = Instant::now();
    board.post(Notice::error("first"), start);
    board.post(Notice::error("second"), start + Duration::from_millis(10));

    let visible = board.visible(start + Duration::from_millis(20));
    assert_eq!(visible[0].message, "second");
    assert_eq!(visible[1].message, "first");
}

#[test]
fn new_notice_does_not_cancel_older_one() {
    let mut board = NoticeBoard::default();
    let start = Instant::now();
    board.post(Notice::success("one"), start);
    board.post(Notice::success("two"), start + Duration::from_secs(2));

    board.prune(start + Duration::from_secs(4));
    let visible = board.visible(start + Duration::from_secs(4));
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].message, "two");
}
