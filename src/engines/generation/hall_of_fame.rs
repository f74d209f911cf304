use crate::engines::generation::individual::{compare_fitness, Individual};
use crate::engines::generation::pareto;
use std::collections::HashSet;

/// Bounded archive of the best distinct genotypes seen during an experiment.
pub struct HallOfFame {
    members: Vec<Individual>,
    max_size: usize,
    seen_signatures: HashSet<String>,
    use_pareto: bool,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            members: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
            use_pareto: false,
        }
    }

    /// Order members by dominance over their objective vectors instead of fitness
    pub fn new_with_pareto(max_size: usize) -> Self {
        Self {
            use_pareto: true,
            ..Self::new(max_size)
        }
    }

    /// Attempt to add an individual, returns false for a duplicate genotype
    pub fn try_add(&mut self, individual: Individual) -> bool {
        let signature = canonical_signature(&individual);
        if self.seen_signatures.contains(&signature) {
            return false;
        }

        self.seen_signatures.insert(signature);
        self.members.push(individual);

        if self.use_pareto {
            self.sort_and_trim_pareto();
        } else {
            self.sort_and_trim_single();
        }
        true
    }

    fn sort_and_trim_single(&mut self) {
        self.members.sort_by(|a, b| compare_fitness(b.fitness, a.fitness));
        self.trim();
    }

    /// Dominant objective vectors first, working fitness left untouched
    fn sort_and_trim_pareto(&mut self) {
        pareto::dominance_sort(&mut self.members);
        self.trim();
    }

    fn trim(&mut self) {
        while self.members.len() > self.max_size {
            if let Some(removed) = self.members.pop() {
                self.seen_signatures.remove(&canonical_signature(&removed));
            }
        }
    }

    pub fn get_all(&self) -> &[Individual] {
        &self.members
    }

    pub fn get_top_n(&self, n: usize) -> &[Individual] {
        &self.members[..n.min(self.members.len())]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Signature used for deduplication: the indented text of the tree
pub fn canonical_signature(individual: &Individual) -> String {
    individual.tree.to_indented_string()
}
