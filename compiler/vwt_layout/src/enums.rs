//! Enum tag allocation.
//!
//! Decides how an enum's discriminant is stored, based on its case shapes:
//!
//! - **No payload**: the case position, little-endian, in the fewest whole
//!   bytes that hold `ceil(log2(cases))` bits.
//! - **Single payload**: empty cases first go into the payload's extra
//!   inhabitants (zero extra bytes); the rest spill into a minimal extra tag
//!   appended right after the payload.
//! - **Multi payload**: the tag goes into the payloads' common spare bits if
//!   enough of them exist, otherwise into a minimal extra tag. Empty cases
//!   share the tag values after the payload cases and keep their index in
//!   the non-spare payload bits.
//!
//! The byte-level operations on [`EnumLayout`] (`read_case`, `inject_case`,
//! `strip_tag`, `payload_bytes`) are the single source of truth for an
//! encoding; witness tables call them rather than re-deriving anything.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::bits::{bits_for, bytes_for, read_le, write_le, BitMask, MAX_EXTRA_INHABITANTS};
use crate::calc::LayoutEngine;
use crate::error::LayoutError;
use crate::layout::{
    Align, ExtraInhabitants, InhabitantEncoding, LayoutKind, LayoutSlot, Name, Ownership,
    TypeLayout,
};

/// Widest extra tag the allocator emits.
pub const MAX_TAG_BYTES: u32 = 4;

/// One enum case as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumCaseDescriptor {
    pub name: Name,
    /// Value `get_enum_tag` reports for this case. Unique per enum.
    pub tag: u32,
    pub payload: Option<LayoutSlot>,
}

impl EnumCaseDescriptor {
    pub fn empty(name: impl Into<Name>, tag: u32) -> Self {
        Self {
            name: name.into(),
            tag,
            payload: None,
        }
    }

    pub fn with_payload(name: impl Into<Name>, tag: u32, payload: impl Into<LayoutSlot>) -> Self {
        Self {
            name: name.into(),
            tag,
            payload: Some(payload.into()),
        }
    }
}

/// A resolved case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseLayout {
    pub name: Name,
    pub tag: u32,
    pub payload: Option<Arc<TypeLayout>>,
}

/// Where a multi-payload enum keeps its tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagStore {
    /// In these bits of the payload area.
    SpareBits(BitMask),
    /// In `width` bytes right after the payload area.
    ExtraBytes { width: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinglePayloadTag {
    pub payload_case: usize,
    /// Empty case positions in declaration order.
    pub empty_cases: Vec<usize>,
    pub payload_size: u32,
    pub payload_inhabitants: ExtraInhabitants,
    /// Empty cases encoded as payload extra inhabitants.
    pub tags_in_inhabitants: u32,
    /// 0 if no case spilled.
    pub extra_tag_width: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiPayloadTag {
    pub payload_cases: Vec<usize>,
    pub empty_cases: Vec<usize>,
    pub payload_size: u32,
    pub num_tags: u64,
    pub store: TagStore,
    /// Payload bits holding an empty case's index within its tag value.
    pub index_bits: BitMask,
    pub cases_per_tag: u64,
}

/// The discriminant strategy chosen for one enum shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagEncoding {
    NoPayload { width: u8 },
    SinglePayload(SinglePayloadTag),
    MultiPayload(MultiPayloadTag),
}

impl fmt::Display for TagEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPayload { width } => write!(f, "no payload, {width}-byte tag"),
            Self::SinglePayload(s) => {
                write!(
                    f,
                    "single payload, {} of {} empty cases in extra inhabitants",
                    s.tags_in_inhabitants,
                    s.empty_cases.len()
                )?;
                if s.extra_tag_width > 0 {
                    write!(f, ", {}-byte extra tag", s.extra_tag_width)?;
                }
                Ok(())
            }
            Self::MultiPayload(m) => {
                write!(f, "multi payload, {} tag values", m.num_tags)?;
                match &m.store {
                    TagStore::SpareBits(mask) => write!(f, " in spare bits {mask}"),
                    TagStore::ExtraBytes { width } => write!(f, " in {width}-byte extra tag"),
                }
            }
        }
    }
}

/// Cases plus their tag encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumLayout {
    pub cases: Vec<CaseLayout>,
    pub encoding: TagEncoding,
}

impl EnumLayout {
    /// Position of the case with tag `tag`.
    pub fn case_of_tag(&self, tag: u32) -> Option<usize> {
        self.cases.iter().position(|c| c.tag == tag)
    }

    /// Size of the payload area (0 for no-payload enums).
    pub fn payload_size(&self) -> u32 {
        match &self.encoding {
            TagEncoding::NoPayload { .. } => 0,
            TagEncoding::SinglePayload(s) => s.payload_size,
            TagEncoding::MultiPayload(m) => m.payload_size,
        }
    }

    /// Case position encoded in `value`, or `None` if the value is not a
    /// valid case (including every value of an uninhabited enum).
    pub fn read_case(&self, value: &[u8]) -> Option<usize> {
        match &self.encoding {
            TagEncoding::NoPayload { width } => {
                let raw = read_le(value.get(..usize::from(*width))?);
                usize::try_from(raw).ok().filter(|&i| i < self.cases.len())
            }
            TagEncoding::SinglePayload(s) => {
                let psize = s.payload_size as usize;
                if s.extra_tag_width > 0 {
                    let tag = read_le(value.get(psize..psize + usize::from(s.extra_tag_width))?);
                    if tag != 0 {
                        let empty = u64::from(s.tags_in_inhabitants) + tag - 1;
                        return s.empty_cases.get(usize::try_from(empty).ok()?).copied();
                    }
                }
                if s.tags_in_inhabitants > 0 {
                    if let Some(i) = s.payload_inhabitants.index_of(value.get(..psize)?) {
                        if i < s.tags_in_inhabitants {
                            return s.empty_cases.get(i as usize).copied();
                        }
                    }
                }
                Some(s.payload_case)
            }
            TagEncoding::MultiPayload(m) => {
                let psize = m.payload_size as usize;
                let payload = value.get(..psize)?;
                let tag = match &m.store {
                    TagStore::SpareBits(mask) => mask.gather(payload),
                    TagStore::ExtraBytes { width } => {
                        read_le(value.get(psize..psize + usize::from(*width))?)
                    }
                };
                let payloads = m.payload_cases.len() as u64;
                if tag < payloads {
                    return m.payload_cases.get(usize::try_from(tag).ok()?).copied();
                }
                let empty = (tag - payloads)
                    .checked_mul(m.cases_per_tag)?
                    .checked_add(m.index_bits.gather(payload))?;
                m.empty_cases.get(usize::try_from(empty).ok()?).copied()
            }
        }
    }

    /// Make `value` encode case `case`.
    ///
    /// For a payload case only the tag is written; the payload must already
    /// be initialized in place. For an empty case the whole value is
    /// written and no payload byte is read.
    pub fn inject_case(&self, value: &mut [u8], case: usize) {
        match &self.encoding {
            TagEncoding::NoPayload { width } => {
                if let Some(dst) = value.get_mut(..usize::from(*width)) {
                    write_le(dst, case as u64);
                }
            }
            TagEncoding::SinglePayload(s) => {
                let psize = s.payload_size as usize;
                let end = psize + usize::from(s.extra_tag_width);
                let Some(value) = value.get_mut(..end) else {
                    return;
                };
                let (payload, tag) = value.split_at_mut(psize);
                if case == s.payload_case {
                    write_le(tag, 0);
                    return;
                }
                let Some(empty) = s.empty_cases.iter().position(|&c| c == case) else {
                    return;
                };
                #[expect(clippy::cast_possible_truncation, reason = "case counts fit in u32")]
                let empty = empty as u32;
                if empty < s.tags_in_inhabitants {
                    s.payload_inhabitants.store(payload, empty);
                    write_le(tag, 0);
                } else {
                    payload.fill(0);
                    write_le(tag, u64::from(empty - s.tags_in_inhabitants) + 1);
                }
            }
            TagEncoding::MultiPayload(m) => {
                let psize = m.payload_size as usize;
                let width = match m.store {
                    TagStore::SpareBits(_) => 0,
                    TagStore::ExtraBytes { width } => usize::from(width),
                };
                let Some(value) = value.get_mut(..psize + width) else {
                    return;
                };
                let (payload, extra) = value.split_at_mut(psize);
                let tag = if let Some(i) = m.payload_cases.iter().position(|&c| c == case) {
                    i as u64
                } else if let Some(e) = m.empty_cases.iter().position(|&c| c == case) {
                    let e = e as u64;
                    payload.fill(0);
                    m.index_bits.scatter(payload, e % m.cases_per_tag);
                    m.payload_cases.len() as u64 + e / m.cases_per_tag
                } else {
                    return;
                };
                match &m.store {
                    TagStore::SpareBits(mask) => mask.scatter(payload, tag),
                    TagStore::ExtraBytes { .. } => write_le(extra, tag),
                }
            }
        }
    }

    /// Clear tag bits that overlap the payload, leaving a plain payload
    /// value in place.
    pub fn strip_tag(&self, value: &mut [u8]) {
        if let TagEncoding::MultiPayload(MultiPayloadTag {
            store: TagStore::SpareBits(mask),
            payload_size,
            ..
        }) = &self.encoding
        {
            if let Some(payload) = value.get_mut(..*payload_size as usize) {
                mask.clear_in(payload);
            }
        }
    }

    /// The payload area of `value` with tag bits cleared.
    ///
    /// Borrowed unless the tag lives in spare bits.
    pub fn payload_bytes<'a>(&self, value: &'a [u8]) -> Cow<'a, [u8]> {
        let psize = (self.payload_size() as usize).min(value.len());
        let payload = &value[..psize];
        match &self.encoding {
            TagEncoding::MultiPayload(MultiPayloadTag {
                store: TagStore::SpareBits(mask),
                ..
            }) => {
                let mut owned = payload.to_vec();
                mask.clear_in(&mut owned);
                Cow::Owned(owned)
            }
            _ => Cow::Borrowed(payload),
        }
    }
}

/// Size-independent results of a strategy, before they become a
/// [`TypeLayout`].
struct EnumParts {
    size: u32,
    alignment: Align,
    spare_bits: BitMask,
    extra_inhabitants: ExtraInhabitants,
    encoding: TagEncoding,
}

fn saturating_inhabitants(total: u64, used: u64) -> u32 {
    let free = total.saturating_sub(used).min(u64::from(MAX_EXTRA_INHABITANTS));
    u32::try_from(free).unwrap_or(MAX_EXTRA_INHABITANTS)
}

fn tag_width(values: u64) -> Result<u8, LayoutError> {
    let width = bytes_for(values);
    if width > MAX_TAG_BYTES {
        return Err(LayoutError::TagOverflow {
            cases: values,
            max_bytes: MAX_TAG_BYTES,
        });
    }
    #[expect(clippy::cast_possible_truncation, reason = "bounded by MAX_TAG_BYTES")]
    Ok(width as u8)
}

impl LayoutEngine {
    /// Choose a tag encoding for `cases` and lay the enum out.
    ///
    /// The resulting layout's [`LayoutKind::Enum`] carries the encoding.
    pub fn allocate_tags(&self, cases: &[EnumCaseDescriptor]) -> Result<TypeLayout, LayoutError> {
        let mut tags: Vec<u32> = cases.iter().map(|c| c.tag).collect();
        tags.sort_unstable();
        if let Some(pair) = tags.windows(2).find(|w| w[0] == w[1]) {
            return Err(LayoutError::DuplicateTag { tag: pair[0] });
        }

        let resolved: Vec<CaseLayout> = cases
            .iter()
            .map(|case| {
                let payload = match &case.payload {
                    Some(slot) => Some(Arc::clone(slot.ready()?)),
                    None => None,
                };
                Ok(CaseLayout {
                    name: case.name.clone(),
                    tag: case.tag,
                    payload,
                })
            })
            .collect::<Result<_, LayoutError>>()?;

        let (payload_cases, empty_cases): (Vec<usize>, Vec<usize>) =
            (0..resolved.len()).partition(|&i| resolved[i].payload.is_some());

        let parts = match payload_cases.as_slice() {
            [] => self.no_payload(resolved.len())?,
            [single] => self.single_payload(&resolved, *single, empty_cases)?,
            _ => self.multi_payload(&resolved, payload_cases, empty_cases)?,
        };

        let mut key = String::from("[");
        for (i, case) in resolved.iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            match &case.payload {
                Some(payload) => key.push_str(&payload.key),
                None => key.push('_'),
            }
        }
        key.push(']');

        let ownership = if resolved
            .iter()
            .filter_map(|c| c.payload.as_ref())
            .all(|p| p.is_trivially_copyable())
        {
            Ownership::Trivial
        } else {
            Ownership::NestedAggregate
        };

        let stride = parts
            .alignment
            .align_up(parts.size)
            .ok_or(LayoutError::SizeOverflow)?;
        let layout = TypeLayout {
            size: parts.size,
            alignment: parts.alignment,
            stride,
            fields: Vec::new(),
            spare_bits: parts.spare_bits,
            extra_inhabitants: parts.extra_inhabitants,
            ownership,
            references: Vec::new(),
            kind: LayoutKind::Enum(Arc::new(EnumLayout {
                cases: resolved,
                encoding: parts.encoding,
            })),
            key: Arc::from(key),
        };
        layout.verify()?;

        if let Some(e) = layout.enum_layout() {
            tracing::debug!(
                key = %layout.key,
                size = layout.size,
                encoding = %e.encoding,
                "allocated enum tags"
            );
        }
        Ok(layout)
    }

    fn no_payload(&self, count: usize) -> Result<EnumParts, LayoutError> {
        let count = count as u64;
        let width = tag_width(count)?;
        let extra_inhabitants = if width == 0 {
            ExtraInhabitants::NONE
        } else {
            ExtraInhabitants::new(
                saturating_inhabitants(1u64 << (8 * u32::from(width)), count),
                InhabitantEncoding::TagValues {
                    offset: 0,
                    width,
                    first: count,
                },
            )
        };
        Ok(EnumParts {
            size: u32::from(width),
            alignment: Align::ONE,
            spare_bits: BitMask::zeros(usize::from(width)),
            extra_inhabitants,
            encoding: TagEncoding::NoPayload { width },
        })
    }

    fn single_payload(
        &self,
        cases: &[CaseLayout],
        payload_case: usize,
        empty_cases: Vec<usize>,
    ) -> Result<EnumParts, LayoutError> {
        let Some(payload) = cases[payload_case].payload.as_ref() else {
            return Err(LayoutError::IncompleteLayout {
                what: format!("payload of case `{}`", cases[payload_case].name),
            });
        };

        let empty = empty_cases.len() as u64;
        let available = if self.config().extra_inhabitants {
            payload.extra_inhabitants.count
        } else {
            0
        };
        let in_inhabitants = u32::try_from(empty.min(u64::from(available))).unwrap_or(available);
        let spilled = empty - u64::from(in_inhabitants);
        let width = if spilled == 0 {
            0
        } else {
            tag_width(spilled + 1)?
        };
        let size = payload
            .size
            .checked_add(u32::from(width))
            .ok_or(LayoutError::SizeOverflow)?;

        let extra_inhabitants = if width == 0 {
            let remaining = available - in_inhabitants;
            let encoding = if in_inhabitants == 0 {
                payload.extra_inhabitants.encoding.clone()
            } else {
                InhabitantEncoding::Skip {
                    inner: Box::new(payload.extra_inhabitants.encoding.clone()),
                    skip: in_inhabitants,
                }
            };
            ExtraInhabitants::new(remaining, encoding)
        } else {
            ExtraInhabitants::new(
                saturating_inhabitants(1u64 << (8 * u32::from(width)), spilled + 1),
                InhabitantEncoding::TagValues {
                    offset: payload.size,
                    width,
                    first: spilled + 1,
                },
            )
        };

        // Once inhabitants are in use the payload's spare bits are no longer
        // free for an enclosing enum.
        let spare_bits = if in_inhabitants == 0 {
            payload.spare_bits.resized(size as usize, 0)
        } else {
            BitMask::zeros(size as usize)
        };

        Ok(EnumParts {
            size,
            alignment: payload.alignment,
            spare_bits,
            extra_inhabitants,
            encoding: TagEncoding::SinglePayload(SinglePayloadTag {
                payload_case,
                empty_cases,
                payload_size: payload.size,
                payload_inhabitants: payload.extra_inhabitants.clone(),
                tags_in_inhabitants: in_inhabitants,
                extra_tag_width: width,
            }),
        })
    }

    fn multi_payload(
        &self,
        cases: &[CaseLayout],
        payload_cases: Vec<usize>,
        empty_cases: Vec<usize>,
    ) -> Result<EnumParts, LayoutError> {
        let payloads: Vec<&Arc<TypeLayout>> = payload_cases
            .iter()
            .filter_map(|&i| cases[i].payload.as_ref())
            .collect();
        let payload_size = payloads.iter().map(|p| p.size).max().unwrap_or(0);
        let alignment = payloads
            .iter()
            .map(|p| p.alignment)
            .max()
            .unwrap_or(Align::ONE);

        // Bytes past the end of a smaller payload are spare for that case.
        let psize = payload_size as usize;
        let common = payloads.iter().fold(BitMask::ones(psize), |acc, p| {
            acc.and(&p.spare_bits.resized(psize, 0xFF))
        });
        let index_bits = common.not().lowest_set_bits(32);
        let cases_per_tag = 1u64 << index_bits.count_ones();

        let num_tags =
            payload_cases.len() as u64 + (empty_cases.len() as u64).div_ceil(cases_per_tag);
        let tag_bits = bits_for(num_tags);

        let (size, spare_bits, extra_inhabitants, store) =
            if self.config().spare_bit_tags && common.count_ones() >= tag_bits {
                let mask = common.lowest_set_bits(tag_bits);
                let spare = common.without(&mask);
                (
                    payload_size,
                    spare,
                    ExtraInhabitants::NONE,
                    TagStore::SpareBits(mask),
                )
            } else {
                let width = tag_width(num_tags)?.max(1);
                let size = payload_size
                    .checked_add(u32::from(width))
                    .ok_or(LayoutError::SizeOverflow)?;
                let extra_inhabitants = ExtraInhabitants::new(
                    saturating_inhabitants(1u64 << (8 * u32::from(width)), num_tags),
                    InhabitantEncoding::TagValues {
                        offset: payload_size,
                        width,
                        first: num_tags,
                    },
                );
                (
                    size,
                    common.resized(size as usize, 0),
                    extra_inhabitants,
                    TagStore::ExtraBytes { width },
                )
            };

        Ok(EnumParts {
            size,
            alignment,
            spare_bits,
            extra_inhabitants,
            encoding: TagEncoding::MultiPayload(MultiPayloadTag {
                payload_cases,
                empty_cases,
                payload_size,
                num_tags,
                store,
                index_bits,
                cases_per_tag,
            }),
        })
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
