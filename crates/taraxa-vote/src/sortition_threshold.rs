//! Vote sortition's `canSpeak` big-integer comparison and the 2t+1
//! quorum arithmetic shared by round-determination and block finalization.

use rug::Integer;
use rug::integer::Order;
use taraxa_crypto::vrf::VrfOutput;

/// `canSpeak(threshold, V)`: ticket * V <= threshold * 2^512, where
/// ticket is the 64-byte VRF output read big-endian.
pub fn can_speak(output: &VrfOutput, threshold: u64, valid_players: u64) -> bool {
    let ticket = Integer::from_digits(output.as_bytes(), Order::MsfBe);
    let max_512 = Integer::from(1) << 512;

    let left = ticket * Integer::from(valid_players);
    let right = max_512 * Integer::from(threshold);
    left <= right
}

/// Quorum size 2t+1 over the committee actually in play: `min(committee_size,
/// total_votes) * 2 / 3 + 1`.
pub fn two_t_plus_one(committee_size: u64, total_votes: u64) -> u64 {
    let c = committee_size.min(total_votes);
    c * 2 / 3 + 1
}

/// Sortition threshold for a committee of size `committee_size` against
/// a DPOS-effective total voting weight `total_votes`: `ceil(C *
/// u64::MAX / V)` when `C <= V`, else `u64::MAX` (every voter wins).
pub fn sortition_threshold(committee_size: u64, total_votes: u64) -> u64 {
    if total_votes == 0 || committee_size > total_votes {
        return u64::MAX;
    }
    let num = committee_size as u128 * u64::MAX as u128;
    let den = total_votes as u128;
    let threshold = (num + den - 1) / den;
    threshold.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ticket_always_speaks() {
        let output = VrfOutput([0u8; 64]);
        assert!(can_speak(&output, 1, 1_000_000));
    }

    #[test]
    fn max_ticket_never_speaks_below_full_threshold() {
        let output = VrfOutput([0xFFu8; 64]);
        assert!(!can_speak(&output, 1, 1000));
    }

    #[test]
    fn two_t_plus_one_matches_byzantine_quorum() {
        assert_eq!(two_t_plus_one(3, 3), 3);
        assert_eq!(two_t_plus_one(4, 4), 3);
        assert_eq!(two_t_plus_one(7, 7), 5);
    }

    #[test]
    fn two_t_plus_one_uses_the_smaller_of_committee_and_total() {
        assert_eq!(two_t_plus_one(10, 3), two_t_plus_one(3, 3));
    }

    #[test]
    fn sortition_threshold_is_max_when_committee_exceeds_total() {
        assert_eq!(sortition_threshold(10, 5), u64::MAX);
    }

    #[test]
    fn sortition_threshold_scales_with_committee_over_total() {
        let small = sortition_threshold(3, 1000);
        let large = sortition_threshold(30, 1000);
        assert!(large > small);
    }
}
