// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! TCP sequence numbers.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;
use std::ops::Sub;

/// A 32-bit TCP sequence number.
///
/// Sequence numbers wrap around at 2^32 and are compared with serial number
/// arithmetic, see RFC 1982 and RFC 9293 Section 3.4. The comparison is not a
/// total order: two numbers exactly 2^31 apart are unordered.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeqNum(u32);

impl SeqNum {
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    /// Return the raw value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for SeqNum {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl PartialOrd for SeqNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.0.wrapping_sub(other.0) as i32 {
            i32::MIN => None,
            diff => Some(diff.cmp(&0)),
        }
    }
}

impl Add<u32> for SeqNum {
    type Output = SeqNum;

    fn add(self, rhs: u32) -> SeqNum {
        SeqNum(self.0.wrapping_add(rhs))
    }
}

/// Distance in bytes from `rhs` forward to `self`.
impl Sub for SeqNum {
    type Output = u32;

    fn sub(self, rhs: SeqNum) -> u32 {
        self.0.wrapping_sub(rhs.0)
    }
}

impl fmt::Debug for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_num_order() {
        assert!(SeqNum::new(1) > SeqNum::new(0));
        assert!(SeqNum::new(0) < SeqNum::new(1));
        assert!(SeqNum::new(7) >= SeqNum::new(7));
        assert_eq!(
            SeqNum::new(7).partial_cmp(&SeqNum::new(7)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn seq_num_half_space_unordered() {
        let a = SeqNum::new(0);
        let b = SeqNum::new(1 << 31);
        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(b.partial_cmp(&a), None);
        assert_eq!(a < b, false);
        assert_eq!(a >= b, false);
        assert_eq!(b < a, false);
        assert_eq!(b >= a, false);

        // One byte less than half the space is still ordered, both ways.
        let c = SeqNum::new((1 << 31) - 1);
        assert_eq!(a.partial_cmp(&c), Some(Ordering::Less));
        assert_eq!(c.partial_cmp(&a), Some(Ordering::Greater));
        let d = SeqNum::new((1 << 31) + 1);
        assert_eq!(a.partial_cmp(&d), Some(Ordering::Greater));
        assert_eq!(d.partial_cmp(&a), Some(Ordering::Less));
    }

    #[test]
    fn seq_num_wrap() {
        let before = SeqNum::new(u32::MAX - 10);
        let after = before + 100;
        assert_eq!(after.value(), 89);
        assert!(after > before);
        assert!(before < after);
        assert_eq!(after - before, 100);
    }

    #[test]
    fn seq_num_display() {
        let s = SeqNum::from(1448);
        assert_eq!(format!("{}", s), "1448");
        assert_eq!(format!("{:?}", s), "1448");
    }
}
