//! Stack frame layout for the generated entry function.
//!
//! All slots are addressed as negative displacements from RBP. Going
//! down from the frame pointer:
//!
//! ```text
//! rbp - 16 - 8*i   local variable i (declaration order)
//! heap_disp        process heap handle
//! stdout_disp      stdout handle
//! bytes_written_disp  WriteFile out-parameter
//! temp0/temp1      container-construction scratch (capacity, result)
//! intbuf_disp      32-byte integer-to-decimal buffer (low end)
//! loop slot k      one 8-byte counter per nested repeat
//! vstack_disp      evaluation stack, max_stack slots, grows upward
//! ```
//!
//! The 32-byte Win64 shadow area sits below all of this: frame size is
//! the 16-aligned block plus 32, so callee spills never alias the
//! evaluation stack.

use cotlinc_util::align_up;

/// Computed frame geometry. Sized once, before any code is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    pub locals: usize,
    pub heap_disp: i32,
    pub stdout_disp: i32,
    pub bytes_written_disp: i32,
    pub temp0_disp: i32,
    pub temp1_disp: i32,
    /// Low end of the 32-byte decimal buffer.
    pub intbuf_disp: i32,
    pub loop_slots: usize,
    pub vstack_disp: i32,
    pub frame_size: u32,
    loop_base_disp: i32,
}

impl FrameLayout {
    pub fn compute(locals: usize, max_repeat: usize, max_stack: usize) -> Self {
        let heap_disp = -16 - 8 * locals as i32;
        let stdout_disp = heap_disp - 8;
        let bytes_written_disp = stdout_disp - 8;
        let temp0_disp = bytes_written_disp - 8;
        let temp1_disp = temp0_disp - 8;
        let intbuf_disp = temp1_disp - 32;
        let loop_base_disp = intbuf_disp - 8;
        let vstack_disp = loop_base_disp - 8 * (max_repeat as i32 - 1) - 8 * max_stack as i32;

        let block = (-vstack_disp) as usize;
        let frame_size = (align_up(block, 16) + 32) as u32;

        Self {
            locals,
            heap_disp,
            stdout_disp,
            bytes_written_disp,
            temp0_disp,
            temp1_disp,
            intbuf_disp,
            loop_slots: max_repeat,
            vstack_disp,
            frame_size,
            loop_base_disp,
        }
    }

    /// Displacement of local variable `index`.
    pub fn local_disp(index: usize) -> i32 {
        -16 - 8 * index as i32
    }

    /// Displacement of the loop counter for nesting level `depth`
    /// (0-based).
    pub fn loop_slot_disp(&self, depth: usize) -> i32 {
        self.loop_base_disp - 8 * depth as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_slots_step_down_by_eight() {
        assert_eq!(FrameLayout::local_disp(0), -16);
        assert_eq!(FrameLayout::local_disp(1), -24);
        assert_eq!(FrameLayout::local_disp(5), -56);
    }

    #[test]
    fn fixed_slots_follow_the_locals() {
        let frame = FrameLayout::compute(2, 0, 0);
        assert_eq!(frame.heap_disp, -32);
        assert_eq!(frame.stdout_disp, -40);
        assert_eq!(frame.bytes_written_disp, -48);
        assert_eq!(frame.temp0_disp, -56);
        assert_eq!(frame.temp1_disp, -64);
        assert_eq!(frame.intbuf_disp, -96);
    }

    #[test]
    fn loop_slots_nest_downward() {
        let frame = FrameLayout::compute(0, 3, 0);
        assert_eq!(frame.loop_slot_disp(0), frame.intbuf_disp - 8);
        assert_eq!(frame.loop_slot_disp(2), frame.intbuf_disp - 24);
    }

    #[test]
    fn evaluation_stack_sits_below_the_loop_slots() {
        let frame = FrameLayout::compute(1, 2, 3);
        let lowest_loop = frame.loop_slot_disp(1);
        assert_eq!(frame.vstack_disp + 8 * 3, lowest_loop);
    }

    #[test]
    fn frame_is_sixteen_aligned_plus_shadow() {
        for (locals, repeats, stack) in [(0, 0, 0), (1, 0, 0), (3, 2, 5), (7, 1, 1)] {
            let frame = FrameLayout::compute(locals, repeats, stack);
            assert_eq!(frame.frame_size % 16, 0, "{locals} {repeats} {stack}");
            let block = (-frame.vstack_disp) as u32;
            assert!(frame.frame_size >= block + 32);
            assert!(frame.frame_size < block + 48);
        }
    }

    #[test]
    fn shadow_area_cannot_alias_the_evaluation_stack() {
        let frame = FrameLayout::compute(0, 0, 4);
        // rsp = rbp - frame_size; the shadow is [rsp, rsp + 32).
        let shadow_top = -(frame.frame_size as i32) + 32;
        assert!(shadow_top <= frame.vstack_disp);
    }
}
