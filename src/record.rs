use crate::{
    CORNERS,
    arbitrary::{Arb, Arbitrary, Pick},
    constant::{self, Constant},
    random::Random,
    size::Size,
    union,
    value::Value,
};
use std::{collections::BTreeMap, rc::Rc};

/// Cartesian product of component arbitraries, generated as a [`Value::List`].
/// Corner cases are the (capped) product of component corner cases; shrinking
/// produces, per position, the tuple with that position shrunk and every
/// other pinned to its current value.
#[derive(Clone, Debug)]
pub struct Tuple {
    components: Vec<Arb>,
}

impl Tuple {
    pub fn new(components: Vec<Arb>) -> Self {
        Self { components }
    }

    fn component_picks(pick: &Pick) -> Option<Vec<Pick>> {
        let values = pick.value.as_list()?;
        let originals = match pick.original.as_list() {
            Some(originals) if originals.len() == values.len() => originals.to_vec(),
            _ => values.to_vec(),
        };
        Some(
            values
                .iter()
                .cloned()
                .zip(originals)
                .map(|(value, original)| Pick::with_original(value, original))
                .collect(),
        )
    }
}

fn assemble(picks: Vec<Pick>) -> Pick {
    let values = picks.iter().map(|pick| pick.value.clone()).collect();
    let originals = picks.into_iter().map(|pick| pick.original).collect();
    Pick {
        value: Value::List(values),
        original: Value::List(originals),
        pre_map: None,
    }
}

/// Capped Cartesian product of per-component corner cases.
fn product(components: &[Vec<Pick>]) -> Vec<Vec<Pick>> {
    let mut rows: Vec<Vec<Pick>> = vec![Vec::new()];
    for corners in components {
        let mut next = Vec::new();
        for row in &rows {
            for corner in corners {
                if next.len() >= CORNERS {
                    break;
                }
                let mut row = row.clone();
                row.push(corner.clone());
                next.push(row);
            }
        }
        rows = next;
        if rows.is_empty() {
            return rows;
        }
    }
    rows
}

/// Shrink options: one per position whose component can still shrink, with
/// the remaining positions pinned to constants.
fn shrink_positions(components: &[Arb], picks: &[Pick]) -> Vec<Vec<Arb>> {
    let mut options = Vec::new();
    for (index, (component, pick)) in components.iter().zip(picks).enumerate() {
        let shrunk = component.shrink(pick);
        if shrunk.is_empty() {
            continue;
        }
        let row: Vec<Arb> = picks
            .iter()
            .enumerate()
            .map(|(position, pick)| {
                if position == index {
                    shrunk.clone()
                } else {
                    Rc::new(Constant::new(pick.value.clone())) as Arb
                }
            })
            .collect();
        options.push(row);
    }
    options
}

impl Arbitrary for Tuple {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let mut picks = Vec::with_capacity(self.components.len());
        for component in &self.components {
            picks.push(component.pick(random)?);
        }
        Some(assemble(picks))
    }

    fn size(&self) -> Size {
        self.components
            .iter()
            .fold(Size::exact(1.0), |size, component| {
                size.times(component.size())
            })
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let components: Vec<_> = self
            .components
            .iter()
            .map(|component| component.corner_cases())
            .collect();
        product(&components).into_iter().map(assemble).collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        let Some(picks) = Tuple::component_picks(pick) else {
            return false;
        };
        picks.len() == self.components.len()
            && self
                .components
                .iter()
                .zip(&picks)
                .all(|(component, pick)| component.can_generate(pick))
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let Some(picks) = Tuple::component_picks(towards) else {
            return constant::empty();
        };
        if picks.len() != self.components.len() {
            return constant::empty();
        }
        let options = shrink_positions(&self.components, &picks)
            .into_iter()
            .map(|row| Rc::new(Tuple::new(row)) as Arb)
            .collect();
        union::options(options)
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        let picks = Tuple::component_picks(pick)?;
        if picks.len() != self.components.len() {
            return None;
        }
        let mut index = 0.0;
        for (component, pick) in self.components.iter().zip(&picks) {
            let size = component.size();
            if !size.is_exact() {
                return None;
            }
            index = index * size.value() + component.index_of(pick)?;
        }
        Some(index)
    }

    fn is_empty(&self) -> bool {
        self.components.iter().any(|component| component.is_empty())
    }
}

/// Named Cartesian product generated as a [`Value::Record`]. Field order in
/// the declaration drives corner-case products and indexing.
#[derive(Clone, Debug)]
pub struct Record {
    fields: Vec<(String, Arb)>,
}

impl Record {
    pub fn new(fields: Vec<(String, Arb)>) -> Self {
        Self { fields }
    }

    fn field_picks(&self, pick: &Pick) -> Option<Vec<Pick>> {
        let values = pick.value.as_record()?;
        if values.len() != self.fields.len() {
            return None;
        }
        let originals = pick.original.as_record();
        let mut picks = Vec::with_capacity(self.fields.len());
        for (name, _) in &self.fields {
            let value = values.get(name)?;
            let original = originals
                .and_then(|originals| originals.get(name))
                .unwrap_or(value);
            picks.push(Pick::with_original(value.clone(), original.clone()));
        }
        Some(picks)
    }

    fn assemble(&self, picks: Vec<Pick>) -> Pick {
        let mut values = BTreeMap::new();
        let mut originals = BTreeMap::new();
        for ((name, _), pick) in self.fields.iter().zip(picks) {
            values.insert(name.clone(), pick.value);
            originals.insert(name.clone(), pick.original);
        }
        Pick {
            value: Value::Record(values),
            original: Value::Record(originals),
            pre_map: None,
        }
    }

    fn as_tuple(&self) -> Tuple {
        Tuple::new(
            self.fields
                .iter()
                .map(|(_, component)| component.clone())
                .collect(),
        )
    }

    /// Rewraps a list-shaped arbitrary (a shrunk tuple) into record shape.
    fn named(&self, inner: Arb) -> Arb {
        if inner.is_empty() {
            return constant::empty();
        }
        let names: Vec<String> = self.fields.iter().map(|(name, _)| name.clone()).collect();
        Rc::new(Named { names, inner })
    }
}

impl Arbitrary for Record {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        let mut picks = Vec::with_capacity(self.fields.len());
        for (_, component) in &self.fields {
            picks.push(component.pick(random)?);
        }
        Some(self.assemble(picks))
    }

    fn size(&self) -> Size {
        self.fields
            .iter()
            .fold(Size::exact(1.0), |size, (_, component)| {
                size.times(component.size())
            })
    }

    fn corner_cases(&self) -> Vec<Pick> {
        let components: Vec<_> = self
            .fields
            .iter()
            .map(|(_, component)| component.corner_cases())
            .collect();
        product(&components)
            .into_iter()
            .map(|row| self.assemble(row))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        let Some(picks) = self.field_picks(pick) else {
            return false;
        };
        self.fields
            .iter()
            .zip(&picks)
            .all(|((_, component), pick)| component.can_generate(pick))
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        let Some(picks) = self.field_picks(towards) else {
            return constant::empty();
        };
        let components: Vec<Arb> = self
            .fields
            .iter()
            .map(|(_, component)| component.clone())
            .collect();
        let options = shrink_positions(&components, &picks)
            .into_iter()
            .map(|row| self.named(Rc::new(Tuple::new(row)) as Arb))
            .collect();
        union::options(options)
    }

    fn index_of(&self, pick: &Pick) -> Option<f64> {
        let picks = self.field_picks(pick)?;
        let tuple = self.as_tuple();
        tuple.index_of(&assemble(picks))
    }

    fn is_empty(&self) -> bool {
        self.fields.iter().any(|(_, component)| component.is_empty())
    }
}

/// Adapter giving record shape to a list-shaped inner arbitrary.
#[derive(Clone, Debug)]
struct Named {
    names: Vec<String>,
    inner: Arb,
}

impl Named {
    fn wrap(&self, pick: Pick) -> Option<Pick> {
        let values = pick.value.as_list()?;
        let originals = match pick.original.as_list() {
            Some(originals) if originals.len() == values.len() => originals.to_vec(),
            _ => values.to_vec(),
        };
        if values.len() != self.names.len() {
            return None;
        }
        let mut record = BTreeMap::new();
        let mut original = BTreeMap::new();
        for (name, (value, source)) in self
            .names
            .iter()
            .zip(values.iter().cloned().zip(originals))
        {
            record.insert(name.clone(), value);
            original.insert(name.clone(), source);
        }
        Some(Pick {
            value: Value::Record(record),
            original: Value::Record(original),
            pre_map: None,
        })
    }

    fn unwrap(&self, pick: &Pick) -> Option<Pick> {
        let values = pick.value.as_record()?;
        let originals = pick.original.as_record();
        let mut list = Vec::with_capacity(self.names.len());
        let mut sources = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let value = values.get(name)?;
            list.push(value.clone());
            sources.push(
                originals
                    .and_then(|originals| originals.get(name))
                    .unwrap_or(value)
                    .clone(),
            );
        }
        Some(Pick {
            value: Value::List(list),
            original: Value::List(sources),
            pre_map: None,
        })
    }
}

impl Arbitrary for Named {
    fn pick(&self, random: &mut Random) -> Option<Pick> {
        self.inner.pick(random).and_then(|pick| self.wrap(pick))
    }

    fn size(&self) -> Size {
        self.inner.size()
    }

    fn corner_cases(&self) -> Vec<Pick> {
        self.inner
            .corner_cases()
            .into_iter()
            .filter_map(|pick| self.wrap(pick))
            .collect()
    }

    fn can_generate(&self, pick: &Pick) -> bool {
        match self.unwrap(pick) {
            Some(pick) => self.inner.can_generate(&pick),
            None => false,
        }
    }

    fn shrink(&self, towards: &Pick) -> Arb {
        match self.unwrap(towards) {
            Some(pick) => {
                let shrunk = self.inner.shrink(&pick);
                if shrunk.is_empty() {
                    constant::empty()
                } else {
                    Rc::new(Named {
                        names: self.names.clone(),
                        inner: shrunk,
                    })
                }
            }
            None => constant::empty(),
        }
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
