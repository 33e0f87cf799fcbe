use roaring::RoaringBitmap;
use crate::core::types::DocId;

#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,       // Occurrences in the document
    pub positions: Vec<u32>,  // Token positions for phrase queries
}

/// Posting list for a term, sorted by doc id
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    /// Record one occurrence. Doc ids only grow, so appends stay sorted.
    pub fn add_occurrence(&mut self, doc_id: DocId, position: u32) {
        match self.postings.last_mut() {
            Some(last) if last.doc_id == doc_id => {
                last.term_freq += 1;
                last.positions.push(position);
            }
            _ => {
                let at = self.postings.partition_point(|p| p.doc_id < doc_id);
                self.postings.insert(at, Posting { doc_id, term_freq: 1, positions: vec![position] });
            }
        }
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.postings[i])
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn docs(&self) -> RoaringBitmap {
        self.postings.iter().map(|p| p.doc_id.0).collect()
    }
}

/// Whether the term position lists contain the terms in order. Each entry
/// pairs a term's positions with its offset in the phrase; a term may sit at
/// most `slop` positions past its expected gap from the previous one.
pub fn positions_match(term_positions: &[(&[u32], u32)], slop: u32) -> bool {
    let Some(((first, first_offset), rest)) = term_positions.split_first() else {
        return false;
    };

    'start: for &start in first.iter() {
        let mut current = start;
        let mut previous_offset = *first_offset;
        for &(positions, offset) in rest {
            let gap = offset.saturating_sub(previous_offset).max(1);
            let min_pos = current + 1;
            let max_pos = current + gap + slop;
            match positions.iter().find(|&&p| p >= min_pos && p <= max_pos) {
                Some(&next) => current = next,
                None => continue 'start,
            }
            previous_offset = offset;
        }
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrences_accumulate_per_document() {
        let mut list = PostingList::new();
        list.add_occurrence(DocId(1), 0);
        list.add_occurrence(DocId(1), 4);
        list.add_occurrence(DocId(3), 2);
        assert_eq!(list.doc_freq(), 2);
        assert_eq!(list.get(DocId(1)).unwrap().positions, vec![0, 4]);
        assert_eq!(list.docs().iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn phrase_positions_honour_slop() {
        let red: &[u32] = &[0, 10];
        let car: &[u32] = &[3, 11];
        assert!(positions_match(&[(red, 0), (car, 1)], 0));
        assert!(positions_match(&[(&[0], 0), (&[3], 1)], 2));
        assert!(!positions_match(&[(&[0], 0), (&[4], 1)], 2));
        assert!(!positions_match(&[(&[5], 0), (&[4], 1)], 5));
    }

    #[test]
    fn phrase_offsets_carry_removed_words() {
        // "state of the art" with the stop words dropped on both sides
        let state: &[u32] = &[0];
        let art: &[u32] = &[3];
        assert!(positions_match(&[(state, 0), (art, 3)], 0));
        assert!(!positions_match(&[(state, 0), (art, 1)], 0));
        assert!(!positions_match(&[(state, 0), (&[4], 3)], 0));
        assert!(positions_match(&[(state, 0), (&[4], 3)], 1));
    }
}
