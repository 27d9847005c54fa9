//! The page splicer. A pure algorithm mapping any `(addr, len)` range to
//! the set of page-aligned fetches a scatter handle must issue, and back
//! again when reassembling fetched pages into a caller's buffer.
//!
//! Nothing here touches a backend or a handle's state — it is reused
//! unchanged by every realization of the scatter handle, and by the
//! tiny-read upgrade logic that lives in `pscatter-core` (this crate only
//! computes *what* a tiny window would be; deciding whether one is in use
//! and upgrading it is stateful and belongs to the handle).

use pscatter_addr::{byte_offset, page_align, pages_span, PAGE_SIZE};

/// One page's worth of a spliced range: which page to fetch, and where its
/// bytes land in both the fetched page buffer and the caller's output
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page_base: u64,
    /// Offset within the (up to one page large) fetched buffer to start
    /// copying from.
    pub src_offset: usize,
    /// Offset within the caller's output buffer to copy to.
    pub dst_offset: usize,
    /// Number of bytes this window contributes.
    pub len: usize,
}

/// Splits `(addr, len)` into the page-aligned windows required to cover it.
///
/// `len` must be greater than zero; callers are expected to have already
/// rejected zero-length and wrap-around ranges (see
/// `pscatter_addr::validate_range`) before calling this.
///
/// Invariant: the sum of every returned window's `len` equals `len`; no two
/// windows overlap in destination space; all windows lie within
/// `[0, len)` of destination space.
pub fn splice(addr: u64, len: u64) -> Vec<PageWindow> {
    debug_assert!(len > 0, "splice called with zero length");
    let num_pages = pages_span(addr, len);
    let base_page = page_align(addr);
    let mut windows = Vec::with_capacity(num_pages as usize);
    let mut remaining = len;
    let mut dst_offset: usize = 0;

    for p in 0..num_pages {
        let page_base = base_page.wrapping_add(p * PAGE_SIZE);
        let (src_offset, cb): (usize, u64) = if p == 0 {
            let off = byte_offset(addr);
            (off as usize, remaining.min(PAGE_SIZE - off))
        } else {
            (0, remaining.min(PAGE_SIZE))
        };
        windows.push(PageWindow {
            page_base,
            src_offset,
            dst_offset,
            len: cb as usize,
        });
        dst_offset += cb as usize;
        remaining -= cb;
    }

    windows
}

/// A sub-page fetch window computed for the tiny-read optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TinyWindow {
    pub page_base: u64,
    pub window_len: usize,
}

/// Maximum length eligible for the tiny-read optimization.
pub const TINY_READ_MAX_LEN: u64 = 0x400;

/// Computes the tiny-read window for a single small read, or `None` if the
/// read is not eligible (too large, or it crosses a page boundary — only a
/// genuinely single-page read may use a sub-page fetch). `force_pageread`
/// mirrors the `SCATTER_FORCE_PAGEREAD` flag: when set, tiny reads are
/// never used regardless of size.
pub fn tiny_window(addr: u64, len: u64, force_pageread: bool) -> Option<TinyWindow> {
    if force_pageread || len == 0 || len > TINY_READ_MAX_LEN {
        return None;
    }
    let off = byte_offset(addr);
    if off + len > PAGE_SIZE {
        return None;
    }
    let raw = off + len;
    let window_len = ((raw + 7) / 8) * 8;
    Some(TinyWindow {
        page_base: page_align(addr),
        window_len: window_len as usize,
    })
}

/// Copies one window's bytes from a fetched page buffer into the caller's
/// output buffer. `page_buf` may be shorter than a full page (a tiny-read
/// buffer); the window's `src_offset..src_offset+len` must still fit
/// within it, which holds as long as the window was computed against the
/// same effective buffer length used to fetch it.
///
/// Returns `false` (and performs no copy) if `page_buf` is too short to
/// satisfy the window — the caller should treat this the same as a missing
/// page.
pub fn copy_window(window: &PageWindow, page_buf: &[u8], out: &mut [u8]) -> bool {
    let src_end = window.src_offset + window.len;
    let dst_end = window.dst_offset + window.len;
    if src_end > page_buf.len() || dst_end > out.len() {
        return false;
    }
    out[window.dst_offset..dst_end].copy_from_slice(&page_buf[window.src_offset..src_end]);
    true
}

/// Reassembles a `(addr, len)` range from a per-page buffer lookup.
///
/// `lookup(page_base)` must return `Some(buf)` for a successfully fetched
/// page (a full page, or the effective tiny-read buffer for that page) and
/// `None` for a missing or failed page. Any missing/failed page
/// fails the whole read; this returns `None` rather than a partially filled
/// buffer.
pub fn reassemble(addr: u64, len: u64, mut lookup: impl FnMut(u64) -> Option<Vec<u8>>) -> Option<Vec<u8>> {
    let windows = splice(addr, len);
    let mut out = vec![0u8; len as usize];
    for w in &windows {
        let page_buf = lookup(w.page_base)?;
        if !copy_window(w, &page_buf, &mut out) {
            return None;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_read_produces_one_window() {
        let w = splice(0x1234, 0x10);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].page_base, 0x1000);
        assert_eq!(w[0].src_offset, 0x234);
        assert_eq!(w[0].dst_offset, 0);
        assert_eq!(w[0].len, 0x10);
    }

    #[test]
    fn crossing_exactly_two_pages() {
        let addr = 0x1ffe;
        let len = 4;
        let w = splice(addr, len);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].page_base, 0x1000);
        assert_eq!(w[0].src_offset, 0xffe);
        assert_eq!(w[0].len, 2);
        assert_eq!(w[0].dst_offset, 0);
        assert_eq!(w[1].page_base, 0x2000);
        assert_eq!(w[1].src_offset, 0);
        assert_eq!(w[1].len, 2);
        assert_eq!(w[1].dst_offset, 2);
    }

    #[test]
    fn windows_sum_to_len_and_are_contiguous_non_overlapping() {
        for (addr, len) in [(0x700u64, 3000u64), (0x0, 8191), (0xfff, 1), (0x9000, 5000)] {
            let w = splice(addr, len);
            let total: usize = w.iter().map(|x| x.len).sum();
            assert_eq!(total as u64, len);
            let mut expected_dst = 0usize;
            for win in &w {
                assert_eq!(win.dst_offset, expected_dst);
                expected_dst += win.len;
            }
        }
    }

    #[test]
    fn tiny_window_rejects_oversize_and_cross_page() {
        assert!(tiny_window(0x1000, 0x401, false).is_none());
        assert!(tiny_window(0x1ffc, 8, false).is_none()); // would cross into next page
        assert!(tiny_window(0x1000, 8, true).is_none()); // force_pageread disables it
    }

    #[test]
    fn tiny_window_rounds_up_to_8_bytes() {
        let t = tiny_window(0x1103, 8, false).unwrap();
        assert_eq!(t.page_base, 0x1000);
        // off=0x103=259, len=8 => raw=267 => ceil to 8 => 272
        assert_eq!(t.window_len, 272);
    }

    #[test]
    fn reassemble_fails_on_missing_page() {
        let got = reassemble(0x1000, 0x10, |_| None);
        assert!(got.is_none());
    }

    #[test]
    fn reassemble_gathers_across_pages() {
        let got = reassemble(0x1ffe, 4, |page_base| {
            Some(match page_base {
                0x1000 => vec![0xAA; 0x1000],
                0x2000 => vec![0xBB; 0x1000],
                _ => unreachable!(),
            })
        })
        .unwrap();
        assert_eq!(got, vec![0xAA, 0xAA, 0xBB, 0xBB]);
    }
}
