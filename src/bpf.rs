// SPDX-License-Identifier: Apache-2.0

use crate::{ErrorKind, PdError};

const CAPTURE_BPF_LEN: u16 = 21;

// Classic BPF for `icmp6 or (udp and src port 547 and dst port 546)`,
// the capture expression of the listener. ICMPv6 is kept so neighbour
// discovery traffic stays observable alongside server replies.
//
//   ldh [12]                        ; ethertype
//   jeq #0x86dd      jt 2   jf 9    ; IPv6
//   ldb [20]                        ; next header
//   jeq #0x3a        jt 19  jf 4    ; ICMPv6 -> accept
//   jeq #0x11        jt 5   jf 20   ; UDP or drop
//   ldh [54]                        ; source port
//   jeq #547         jt 7   jf 20
//   ldh [56]                        ; destination port
//   jeq #546         jt 19  jf 20
//   jeq #0x0800      jt 10  jf 20   ; IPv4
//   ldb [23]                        ; protocol
//   jeq #0x11        jt 12  jf 20
//   ldh [20]
//   jset #0x1fff     jt 20  jf 14   ; drop fragments
//   ldxb 4*([14]&0xf)
//   ldh [x + 14]
//   jeq #547         jt 17  jf 20
//   ldh [x + 16]
//   jeq #546         jt 19  jf 20
//   ret #262144                     ; accept
//   ret #0                          ; drop
const CAPTURE_BPF_RAW: [(u16, u8, u8, u32); CAPTURE_BPF_LEN as usize] = [
    (0x28, 0, 0, 0x0000000c),
    (0x15, 0, 7, 0x000086dd),
    (0x30, 0, 0, 0x00000014),
    (0x15, 15, 0, 0x0000003a),
    (0x15, 0, 15, 0x00000011),
    (0x28, 0, 0, 0x00000036),
    (0x15, 0, 13, 0x00000223),
    (0x28, 0, 0, 0x00000038),
    (0x15, 10, 11, 0x00000222),
    (0x15, 0, 10, 0x00000800),
    (0x30, 0, 0, 0x00000017),
    (0x15, 0, 8, 0x00000011),
    (0x28, 0, 0, 0x00000014),
    (0x45, 6, 0, 0x00001fff),
    (0xb1, 0, 0, 0x0000000e),
    (0x48, 0, 0, 0x0000000e),
    (0x15, 0, 3, 0x00000223),
    (0x48, 0, 0, 0x00000010),
    (0x15, 0, 1, 0x00000222),
    (0x6, 0, 0, 0x00040000),
    (0x6, 0, 0, 0x00000000),
];

// `ret #0`: transmit-only sockets attach this so their receive buffer never
// accumulates traffic nobody reads.
const REJECT_ALL_BPF_RAW: [(u16, u8, u8, u32); 1] = [(0x6, 0, 0, 0x00000000)];

pub(crate) fn apply_capture_bpf(fd: libc::c_int) -> Result<(), PdError> {
    apply_bpf(fd, &CAPTURE_BPF_RAW)
}

pub(crate) fn apply_reject_all_bpf(fd: libc::c_int) -> Result<(), PdError> {
    apply_bpf(fd, &REJECT_ALL_BPF_RAW)
}

fn apply_bpf(
    fd: libc::c_int,
    instructions: &[(u16, u8, u8, u32)],
) -> Result<(), PdError> {
    let mut raw_filters: Vec<libc::sock_filter> = Vec::new();
    for (code, jt, jf, k) in instructions {
        raw_filters.push(libc::sock_filter {
            code: *code,
            jt: *jt,
            jf: *jf,
            k: *k,
        });
    }
    let bpf_filter = libc::sock_fprog {
        len: instructions.len() as u16,
        filter: raw_filters.as_mut_ptr(),
    };

    unsafe {
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ATTACH_FILTER,
            (&bpf_filter as *const _) as *const libc::c_void,
            std::mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
        );
        if rc != 0 {
            return Err(PdError::new(
                ErrorKind::Bug,
                format!("Failed to apply socket BPF filter, error: {rc}"),
            ));
        }
    }
    Ok(())
}
