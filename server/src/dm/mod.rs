//! Direct messages between two users.
//!
//! Delivery runs through a two-party chat room whose id both participants
//! derive independently, so it must be a pure function of the two ids.

pub mod conversations;
pub mod messages;
pub mod router;
pub mod store;

/// Deterministic chat room id: the two user ids sorted and joined with `_`.
pub fn chat_room_id(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}", low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_room_id_ignores_argument_order() {
        assert_eq!(chat_room_id("alice", "bob"), "alice_bob");
        assert_eq!(chat_room_id("bob", "alice"), "alice_bob");
        assert_eq!(
            chat_room_id("0190a-2", "0190a-10"),
            chat_room_id("0190a-10", "0190a-2")
        );
    }
}
